use crate::Error;
use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;

/// Encodes bytes with the standard base64 alphabet, without padding.
pub(crate) fn base64_encode(input: impl AsRef<[u8]>) -> String {
    STANDARD_NO_PAD.encode(input)
}

/// Decodes an unpadded standard-alphabet base64 string.
pub(crate) fn base64_decode(input: impl AsRef<[u8]>) -> Result<Vec<u8>, Error> {
    STANDARD_NO_PAD
        .decode(input)
        .map_err(|_| Error::InvalidInput)
}

/// Decodes base64 into a fixed-size array, rejecting any other length.
pub(crate) fn base64_decode_array<const N: usize>(input: impl AsRef<[u8]>) -> Result<[u8; N], Error> {
    let decoded = base64_decode(input)?;
    let mut bytes = [0u8; N];

    if decoded.len() != N {
        return Err(Error::InvalidInput);
    }

    bytes.copy_from_slice(&decoded);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_is_unpadded() {
        assert_eq!(base64_encode(b"Hello"), "SGVsbG8");
        assert_eq!(base64_decode("SGVsbG8").unwrap(), b"Hello");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(base64_decode("not base64!!"), Err(Error::InvalidInput));
    }

    #[test]
    fn test_decode_array_rejects_wrong_length() {
        let encoded = base64_encode([0u8; 16]);
        assert!(base64_decode_array::<16>(&encoded).is_ok());
        assert_eq!(base64_decode_array::<32>(&encoded), Err(Error::InvalidInput));
    }
}
