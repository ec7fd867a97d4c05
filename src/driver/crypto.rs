//! Packet encryption for Discord's secure RTP transport.
//!
//! Wire format follows libsodium's `crypto_secretbox_easy`: the 16-byte
//! authentication tag sits between the RTP header and the ciphertext.
//! The nonce is always the packet's first 12 bytes (the RTP header)
//! right-padded with zeroes, whatever the rest of the packet claims
//! about itself; received packets are adversarial input.
use crypto_secretbox::{
    AeadInPlace,
    Error as CryptoError,
    Nonce,
    SecretBox,
    Tag,
    XSalsa20Poly1305 as Cipher,
};
use discortp::rtp::RtpPacket;

pub const TAG_SIZE: usize = SecretBox::<()>::TAG_SIZE;

const HEADER_LEN: usize = RtpPacket::minimum_packet_size();

fn header_nonce(header: &[u8]) -> Nonce {
    let mut nonce = Nonce::default();
    nonce[..HEADER_LEN].copy_from_slice(&header[..HEADER_LEN]);
    nonce
}

/// Encrypts a full RTP packet in place using the given cipher.
///
/// The packet must hold [`TAG_SIZE`] spare bytes between the header and
/// the plaintext, which receive the authentication tag.
#[inline]
pub(crate) fn encrypt_in_place(packet: &mut [u8], cipher: &Cipher) -> Result<(), CryptoError> {
    if packet.len() < HEADER_LEN + TAG_SIZE {
        return Err(CryptoError);
    }

    let (header, body) = packet.split_at_mut(HEADER_LEN);
    let nonce = header_nonce(header);

    let tag = cipher.encrypt_in_place_detached(&nonce, b"", &mut body[TAG_SIZE..])?;
    body[..TAG_SIZE].copy_from_slice(&tag[..]);

    Ok(())
}

/// Decrypts a full RTP packet in place using the given cipher.
///
/// If successful, returns the number of bytes to be ignored from the
/// start of the packet body (i.e. the authentication tag).
#[inline]
pub(crate) fn decrypt_in_place(packet: &mut [u8], cipher: &Cipher) -> Result<usize, CryptoError> {
    if packet.len() < HEADER_LEN + TAG_SIZE {
        return Err(CryptoError);
    }

    let (header, body) = packet.split_at_mut(HEADER_LEN);
    let nonce = header_nonce(header);

    let (tag_bytes, data_bytes) = body.split_at_mut(TAG_SIZE);
    let tag = Tag::from_slice(tag_bytes);

    cipher
        .decrypt_in_place_detached(&nonce, b"", data_bytes, tag)
        .map(|()| TAG_SIZE)
}

#[cfg(test)]
mod test {
    use super::*;
    use crypto_secretbox::KeyInit;

    pub const KEY_SIZE: usize = SecretBox::<()>::KEY_SIZE;

    const HEADER: [u8; HEADER_LEN] = [
        0x80, 0x78, 0x00, 0x01, 0x00, 0x00, 0x01, 0xE0, 0x00, 0x00, 0x00, 0x07,
    ];

    fn sealed(payload: &[u8], cipher: &Cipher) -> Vec<u8> {
        let mut packet = vec![0u8; HEADER_LEN + TAG_SIZE + payload.len()];
        packet[..HEADER_LEN].copy_from_slice(&HEADER);
        packet[HEADER_LEN + TAG_SIZE..].copy_from_slice(payload);

        encrypt_in_place(&mut packet, cipher).unwrap();
        packet
    }

    #[test]
    fn small_packet_decrypts_error() {
        let cipher = Cipher::new_from_slice(&[1u8; KEY_SIZE]).unwrap();

        // AIM: should error, and not panic.
        let mut bare_header = HEADER;
        assert!(decrypt_in_place(&mut bare_header[..], &cipher).is_err());

        let mut empty: [u8; 0] = [];
        assert!(decrypt_in_place(&mut empty[..], &cipher).is_err());
    }

    #[test]
    fn symmetric_encrypt_decrypt() {
        const TRUE_PAYLOAD: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];
        let cipher = Cipher::new_from_slice(&[7u8; KEY_SIZE]).unwrap();

        let mut packet = sealed(&TRUE_PAYLOAD, &cipher);
        let body_start = decrypt_in_place(&mut packet, &cipher).unwrap();

        assert_eq!(body_start, TAG_SIZE);
        assert_eq!(&packet[HEADER_LEN + TAG_SIZE..], &TRUE_PAYLOAD[..]);
    }

    #[test]
    fn nonce_is_header_with_zero_padding() {
        let nonce = header_nonce(&HEADER);

        assert_eq!(&nonce[..HEADER_LEN], &HEADER[..]);
        assert!(nonce[HEADER_LEN..].iter().all(|&b| b == 0));
    }

    #[test]
    fn bit_flips_fail_authentication() {
        let cipher = Cipher::new_from_slice(&[9u8; KEY_SIZE]).unwrap();
        let clean = sealed(b"hello", &cipher);

        // Flipping any single bit of the tag or ciphertext must fail.
        for byte in HEADER_LEN..clean.len() {
            for bit in 0..8 {
                let mut tampered = clean.clone();
                tampered[byte] ^= 1 << bit;

                assert!(decrypt_in_place(&mut tampered, &cipher).is_err());
            }
        }
    }

    #[test]
    fn empty_payload_round_trips() {
        let cipher = Cipher::new_from_slice(&[3u8; KEY_SIZE]).unwrap();

        let mut packet = sealed(b"", &cipher);
        assert_eq!(packet.len(), 28);
        assert!(decrypt_in_place(&mut packet, &cipher).is_ok());
    }
}
