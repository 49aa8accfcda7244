//! PIX BR-code payload generation.
//!
//! Emits the EMV-style tagged payload consumed by Brazilian instant-payment
//! scanners: `tag(2 digits) + length(2 digits, zero-padded) + value` fields
//! terminated by a CRC-16 checksum field. The output is a pure function of
//! the merchant configuration and the charged amount, byte-for-byte
//! reproducible. QR image rendering is left to the caller; the contract
//! ends at the payload string.

use rust_decimal::Decimal;
use thiserror::Error;

/// Merchant identity baked into every payload.
#[derive(Debug, Clone)]
pub struct PixConfig {
    /// PIX key registered with the merchant's bank.
    pub key: String,
    pub merchant_name: String,
    pub merchant_city: String,
}

/// Payload encoding errors. Unreachable for valid configuration and
/// two-decimal amounts.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("field {tag} value is {len} bytes; EMV fields cap at 99")]
    FieldTooLong { tag: &'static str, len: usize },
}

const PAYLOAD_FORMAT_INDICATOR: &str = "01";
const POINT_OF_INITIATION_DYNAMIC: &str = "12";
const PIX_GUI: &str = "br.gov.bcb.pix";
const MERCHANT_CATEGORY_UNSPECIFIED: &str = "0000";
const CURRENCY_BRL: &str = "986";
const COUNTRY_BR: &str = "BR";
const REFERENCE_LABEL_NONE: &str = "***";
const CRC_PLACEHOLDER: &str = "6304";

fn field(tag: &'static str, value: &str) -> Result<String, EncodeError> {
    let len = value.len();
    if len > 99 {
        return Err(EncodeError::FieldTooLong { tag, len });
    }
    Ok(format!("{tag}{len:02}{value}"))
}

/// Builds the full scannable payload for `amount`.
///
/// `None` omits the amount field entirely (open-value code); `Some` always
/// emits it, zero included, formatted to exactly two decimal places.
pub fn build_payload(config: &PixConfig, amount: Option<Decimal>) -> Result<String, EncodeError> {
    // Tag 26 nests the bank-issued GUI and the merchant key.
    let key_descriptor = format!("{}{}", field("00", PIX_GUI)?, field("01", &config.key)?);

    let mut payload = String::new();
    payload.push_str(&field("00", PAYLOAD_FORMAT_INDICATOR)?);
    payload.push_str(&field("26", &key_descriptor)?);
    payload.push_str(&field("01", POINT_OF_INITIATION_DYNAMIC)?);
    payload.push_str(&field("52", MERCHANT_CATEGORY_UNSPECIFIED)?);
    payload.push_str(&field("53", CURRENCY_BRL)?);
    if let Some(amount) = amount {
        payload.push_str(&field("54", &format!("{amount:.2}"))?);
    }
    payload.push_str(&field("58", COUNTRY_BR)?);
    payload.push_str(&field("59", &config.merchant_name)?);
    payload.push_str(&field("60", &config.merchant_city)?);
    payload.push_str(&field("62", &field("05", REFERENCE_LABEL_NONE)?)?);

    // The checksum covers everything emitted so far plus its own tag and
    // length placeholder.
    payload.push_str(CRC_PLACEHOLDER);
    let crc = crc16_ccitt(&payload);
    payload.push_str(&crc);
    Ok(payload)
}

/// CRC-16/CCITT-FALSE: polynomial 0x1021, initial register 0xFFFF, no final
/// XOR, reported as four uppercase hex digits.
pub fn crc16_ccitt(payload: &str) -> String {
    let mut crc: u16 = 0xFFFF;
    for byte in payload.bytes() {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    format!("{crc:04X}")
}
