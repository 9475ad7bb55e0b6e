use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

type STDRESULT = Result<(), Box<dyn std::error::Error>>;

fn sample_text() -> Vec<u8> {
    "the quick brown fox jumps over the lazy dog.\n"
        .repeat(64)
        .into_bytes()
}

#[test]
fn compress_then_decompress_round_trips() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("input.txt");
    let cmp_path = temp_dir.path().join("input.lz77");
    let out_path = temp_dir.path().join("output.txt");
    let data = sample_text();
    std::fs::write(&in_path, &data)?;

    Command::cargo_bin("retrolz77")?
        .arg("compress")
        .arg("-w")
        .arg("512")
        .arg("-l")
        .arg("32")
        .arg("-i")
        .arg(&in_path)
        .arg("-o")
        .arg(&cmp_path)
        .assert()
        .success();

    let compressed = std::fs::read(&cmp_path)?;
    assert_eq!(&compressed[0..4], b"LZ77");
    assert!(compressed.len() < data.len());

    Command::cargo_bin("retrolz77")?
        .arg("decompress")
        .arg("-i")
        .arg(&cmp_path)
        .arg("-o")
        .arg(&out_path)
        .assert()
        .success();

    let expanded = std::fs::read(&out_path)?;
    assert_eq!(expanded, data);
    Ok(())
}

#[test]
fn compress_uses_default_window_and_lookahead() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("input.txt");
    let cmp_path = temp_dir.path().join("input.lz77");
    std::fs::write(&in_path, sample_text())?;

    Command::cargo_bin("retrolz77")?
        .arg("compress")
        .arg("-i")
        .arg(&in_path)
        .arg("-o")
        .arg(&cmp_path)
        .assert()
        .success();

    let compressed = std::fs::read(&cmp_path)?;
    assert_eq!(u16::from_be_bytes([compressed[8], compressed[9]]), 4096);
    assert_eq!(u16::from_be_bytes([compressed[10], compressed[11]]), 60);
    Ok(())
}

#[test]
fn compress_rejects_lookahead_exceeding_window() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("input.txt");
    let cmp_path = temp_dir.path().join("input.lz77");
    std::fs::write(&in_path, b"hello")?;

    Command::cargo_bin("retrolz77")?
        .arg("compress")
        .arg("-w")
        .arg("8")
        .arg("-l")
        .arg("16")
        .arg("-i")
        .arg(&in_path)
        .arg("-o")
        .arg(&cmp_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("lookahead_max"));
    Ok(())
}

#[test]
fn decompress_rejects_corrupt_magic() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let bad_path = temp_dir.path().join("bad.lz77");
    let out_path = temp_dir.path().join("out.txt");
    let mut header = vec![b'X', b'Z', b'7', b'7', 0x10, 0, 0, 0, 0, 4, 0, 2];
    header.extend_from_slice(&[0u8; 4]);
    std::fs::write(&bad_path, &header)?;

    Command::cargo_bin("retrolz77")?
        .arg("decompress")
        .arg("-i")
        .arg(&bad_path)
        .arg("-o")
        .arg(&out_path)
        .assert()
        .failure();
    Ok(())
}

#[test]
fn empty_file_round_trips_to_empty() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("empty.txt");
    let cmp_path = temp_dir.path().join("empty.lz77");
    let out_path = temp_dir.path().join("empty.out");
    std::fs::write(&in_path, b"")?;

    Command::cargo_bin("retrolz77")?
        .arg("compress")
        .arg("-i")
        .arg(&in_path)
        .arg("-o")
        .arg(&cmp_path)
        .assert()
        .success();

    Command::cargo_bin("retrolz77")?
        .arg("decompress")
        .arg("-i")
        .arg(&cmp_path)
        .arg("-o")
        .arg(&out_path)
        .assert()
        .success();

    assert_eq!(std::fs::read(&out_path)?, Vec::<u8>::new());
    Ok(())
}
