//! Draft-76 challenge: nonce read and MD5 digest.

use md5::{Digest, Md5};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::HandshakeError;

/// Bytes of nonce (`key3`) the client sends after its header block.
pub const NONCE_LEN: usize = 8;

/// Bytes of digest written as the 101 response body.
pub const DIGEST_LEN: usize = 16;

/// Computes `MD5(part1_be || part2_be || nonce)`.
#[must_use]
pub fn challenge_response(part1: u32, part2: u32, nonce: &[u8; NONCE_LEN]) -> [u8; DIGEST_LEN] {
    let mut hasher = Md5::new();
    hasher.update(part1.to_be_bytes());
    hasher.update(part2.to_be_bytes());
    hasher.update(nonce);
    hasher.finalize().into()
}

/// Reads exactly [`NONCE_LEN`] bytes.
///
/// # Errors
///
/// - [`HandshakeError::ShortRead`] if the stream ends first.
/// - [`HandshakeError::Io`] on transport failure.
pub async fn read_nonce<R>(reader: &mut R) -> Result<[u8; NONCE_LEN], HandshakeError>
where
    R: AsyncRead + Unpin,
{
    let mut nonce = [0u8; NONCE_LEN];
    let mut received = 0;
    while let Some(rest) = nonce.get_mut(received..).filter(|rest| !rest.is_empty()) {
        let n = reader.read(rest).await?;
        if n == 0 {
            return Err(HandshakeError::ShortRead {
                expected: NONCE_LEN,
                received,
            });
        }
        received += n;
    }
    Ok(nonce)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const PART1: u32 = 829_309_203;
    const PART2: u32 = 259_970_620;
    const NONCE: [u8; NONCE_LEN] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn matches_golden_vector() {
        let digest = challenge_response(PART1, PART2, &NONCE);
        assert_eq!(
            digest,
            [
                0x63, 0x3a, 0x10, 0xcc, 0x2b, 0x10, 0x3a, 0x17, 0xf7, 0x1e, 0x99, 0xe5, 0xb1, 0xc3,
                0x67, 0xb1
            ]
        );
    }

    #[test]
    fn matches_draft_example() {
        let digest = challenge_response(PART1, PART2, b"^n:ds[4U");
        assert_eq!(&digest, b"8jKS'y:G*Co,Wxa-");
    }

    #[test]
    fn is_deterministic() {
        let first = challenge_response(PART1, PART2, &NONCE);
        for _ in 0..8 {
            assert_eq!(challenge_response(PART1, PART2, &NONCE), first);
        }
    }

    #[test]
    fn part_order_matters() {
        assert_ne!(
            challenge_response(PART1, PART2, &NONCE),
            challenge_response(PART2, PART1, &NONCE)
        );
    }

    #[tokio::test]
    async fn reads_nonce_across_partial_reads() {
        let mut reader = tokio_test::io::Builder::new()
            .read(&[0x01, 0x02, 0x03])
            .read(&[0x04, 0x05, 0x06, 0x07, 0x08])
            .build();
        let Ok(nonce) = read_nonce(&mut reader).await else {
            panic!("nonce should be read in full");
        };
        assert_eq!(nonce, NONCE);
    }

    #[tokio::test]
    async fn leaves_following_bytes_unread() {
        let mut reader: &[u8] = b"^n:ds[4U\x00frame\xff";
        let Ok(nonce) = read_nonce(&mut reader).await else {
            panic!("nonce should be read in full");
        };
        assert_eq!(&nonce, b"^n:ds[4U");
        assert_eq!(reader, b"\x00frame\xff");
    }

    #[tokio::test]
    async fn short_read_is_an_error() {
        let mut reader: &[u8] = &[0x01, 0x02, 0x03, 0x04, 0x05];
        let Err(HandshakeError::ShortRead { expected, received }) = read_nonce(&mut reader).await
        else {
            panic!("expected ShortRead");
        };
        assert_eq!(expected, NONCE_LEN);
        assert_eq!(received, 5);
    }
}
