//! Program image loading.

use std::io::Write;

use fetchsim::isa::decoder::{encode_alu, encode_jump};
use fetchsim::sim::loader::{read_image, words_to_bytes};
use tempfile::NamedTempFile;

#[test]
fn test_read_image_round_trip() {
    let words = vec![encode_alu(), encode_jump(-8), encode_alu()];
    let bytes = words_to_bytes(&words);

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();

    let loaded = read_image(file.path()).unwrap();
    assert_eq!(loaded, bytes);
}

#[test]
fn test_words_to_bytes_is_little_endian() {
    let bytes = words_to_bytes(&[0x0403_0201]);
    assert_eq!(bytes, vec![0x01, 0x02, 0x03, 0x04]);
}

#[test]
fn test_empty_image_is_rejected() {
    let file = NamedTempFile::new().unwrap();
    assert!(read_image(file.path()).is_err());
}
