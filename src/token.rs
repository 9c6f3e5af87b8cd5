//! # Signed Tokens
//!
//! Self-contained, tamper-evident tokens carrying a JSON payload. Bridges
//! use them for state strings that leave the process (login links, OAuth
//! state parameters) and must come back unmodified.
//!
//! ## Token Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           TOKEN LAYOUT                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   1d930897...8d4a2595 : eyJ1aWQiOiAidTEifQ==                            │
//! │   └──── checksum ───┘   └──── encoded payload ──┘                      │
//! │                                                                         │
//! │   encoded  = base64url( utf8( json(payload) ) )                         │
//! │   checksum = hex( SHA-256( encoded ‖ utf8(key) ) )                      │
//! │                                                                         │
//! │   • checksum is always 64 lowercase hex characters                     │
//! │   • encoded payload is padded on output, padding optional on input     │
//! │   • the token is split on the FIRST ':' only                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The checksum is a keyed hash (`key` appended to the message), not HMAC.
//! Changing it would invalidate every token already in circulation.
//!
//! Verification returns `None` for every kind of bad input. Callers cannot
//! tell a wrong checksum from a broken encoding.

use std::fmt;
use std::io;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::TOKEN_SECRET_ENV;
use crate::error::{Error, Result};

/// Separator between checksum and encoded payload
pub const TOKEN_SEPARATOR: char = ':';

/// Length of the hex-encoded SHA-256 checksum
pub const CHECKSUM_LEN: usize = 64;

/// Default payload shape: a JSON object
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// URL-safe decoder that accepts payloads with or without `=` padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

// ============================================================================
// SIGNING KEY
// ============================================================================

/// Secret key material for signing tokens.
///
/// Never empty. `Debug` output is redacted.
#[derive(Clone)]
pub struct SigningKey {
    key: String,
}

impl SigningKey {
    /// Wrap a secret, rejecting the empty string.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::InvalidKey("signing key must not be empty".into()));
        }
        Ok(Self { key })
    }

    /// Load the key from `BRIDGE_TOKEN_SECRET`.
    ///
    /// `Ok(None)` when the variable is unset; an error when it is set but
    /// empty.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_optional(std::env::var(TOKEN_SECRET_ENV).ok())
    }

    /// Wrap a secret that may not have been configured.
    pub fn from_optional(key: Option<String>) -> Result<Option<Self>> {
        key.map(Self::new).transpose()
    }

    /// Get the key (for internal use)
    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey([REDACTED])")
    }
}

// ============================================================================
// CODEC
// ============================================================================

/// Signs and verifies tokens with a fixed key.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    key: SigningKey,
}

impl TokenCodec {
    /// Create a codec bound to `key`
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Sign `payload` into a token string.
    pub fn sign<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String> {
        sign_token(self.key.as_str(), payload)
    }

    /// Verify `token` and decode its payload.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Option<T> {
        verify_token(self.key.as_str(), token)
    }
}

/// Sign `payload` with `key`.
///
/// Deterministic: the same key and payload always produce the same token.
///
/// ## Errors
///
/// [`Error::SerializationError`] if the payload cannot be rendered as JSON
/// (for example a map with non-string keys).
pub fn sign_token<T: Serialize + ?Sized>(key: &str, payload: &T) -> Result<String> {
    let json = to_token_json(payload)?;
    let encoded = URL_SAFE.encode(json);
    let checksum = compute_checksum(key, encoded.as_bytes());
    Ok(format!("{}{}{}", checksum, TOKEN_SEPARATOR, encoded))
}

/// Verify `token` against `key` and decode its payload.
///
/// Returns `None` if the token is empty, has no separator, carries the
/// wrong checksum, holds invalid base64url, or does not decode to JSON of
/// shape `T`.
pub fn verify_token<T: DeserializeOwned>(key: &str, token: &str) -> Option<T> {
    let payload = verify_inner(key, token);
    if payload.is_none() {
        tracing::debug!(len = token.len(), "[Token] Rejected token");
    }
    payload
}

fn verify_inner<T: DeserializeOwned>(key: &str, token: &str) -> Option<T> {
    if token.is_empty() {
        return None;
    }

    let (checksum, encoded) = token.split_once(TOKEN_SEPARATOR)?;

    let expected = compute_checksum(key, encoded.as_bytes());
    if !constant_time_eq(checksum.as_bytes(), expected.as_bytes()) {
        return None;
    }

    let json = URL_SAFE_LENIENT.decode(encoded).ok()?;
    serde_json::from_slice(&json).ok()
}

/// `hex(SHA-256(payload ‖ key))`
fn compute_checksum(key: &str, payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b) {
        result |= x ^ y;
    }
    result == 0
}

// ============================================================================
// JSON LAYOUT
// ============================================================================

/// Serialize with the layout tokens have always used: `", "` and `": "`
/// separators, and every character outside printable ASCII written as a
/// lowercase `\uXXXX` escape (surrogate pairs above the BMP).
fn to_token_json<T: Serialize + ?Sized>(payload: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(128);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, TokenJsonFormatter);
    payload.serialize(&mut ser)?;
    Ok(buf)
}

struct TokenJsonFormatter;

impl serde_json::ser::Formatter for TokenJsonFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    // Quotes, backslashes and C0 controls never reach here; serde_json
    // routes them through `write_char_escape`.
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if (' '..='~').contains(&ch) {
                continue;
            }
            if start < i {
                writer.write_all(fragment[start..i].as_bytes())?;
            }
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    // serde_json writes null for NaN and infinities before reaching these.
    fn write_f64<W>(&mut self, writer: &mut W, value: f64) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(float_repr(&format!("{:e}", value)).as_bytes())
    }

    fn write_f32<W>(&mut self, writer: &mut W, value: f32) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(float_repr(&format!("{:e}", value)).as_bytes())
    }
}

/// Lay out a float from its shortest round-trip digits (`{:e}` output).
///
/// Positional when the decimal point falls within `-4 < point <= 16`, with
/// a trailing `.0` on integral values. Otherwise scientific, with a signed
/// exponent of at least two digits: `1e+16`, `1.5e-07`.
fn float_repr(sci: &str) -> String {
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let point = exp + 1;

    let mut out = String::with_capacity(digits.len() + 8);
    out.push_str(sign);

    if point <= -4 || point > 16 {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push_str(&format!("e{}{:02}", if exp < 0 { '-' } else { '+' }, exp.abs()));
    } else if point <= 0 {
        out.push_str("0.");
        out.push_str(&"0".repeat(point.unsigned_abs() as usize));
        out.push_str(&digits);
    } else {
        let point = point as usize;
        if point >= digits.len() {
            out.push_str(&digits);
            out.push_str(&"0".repeat(point - digits.len()));
            out.push_str(".0");
        } else {
            out.push_str(&digits[..point]);
            out.push('.');
            out.push_str(&digits[point..]);
        }
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::HashMap;

    const UID_TOKEN: &str =
        "1d930897aef107d574c95484f47f8daab90f8b4f2cd9f3788cca7c228d4a2595:eyJ1aWQiOiAidTEifQ==";

    fn uid_payload() -> Payload {
        let mut payload = Payload::new();
        payload.insert("uid".into(), json!("u1"));
        payload
    }

    #[test]
    fn test_sign_known_vector() {
        let token = sign_token("secret", &uid_payload()).unwrap();
        assert_eq!(token, UID_TOKEN);

        let (checksum, encoded) = token.split_once(':').unwrap();
        assert_eq!(checksum.len(), CHECKSUM_LEN);
        assert!(checksum
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));

        let decoded = URL_SAFE.decode(encoded).unwrap();
        assert_eq!(decoded, br#"{"uid": "u1"}"#);
    }

    #[test]
    fn test_sign_is_deterministic() {
        let a = sign_token("secret", &uid_payload()).unwrap();
        let b = sign_token("secret", &uid_payload()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sign_preserves_key_order_and_layout() {
        let payload = json!({
            "room": "!abc:example.org",
            "n": 3,
            "ok": true,
            "x": null,
            "list": [1, 2],
        });
        let token = sign_token("secret", &payload).unwrap();
        assert_eq!(
            token,
            "40df7df23a8ea8eb41035927f7acfc2077d75923679451a4631c6a3977a0edae:\
             eyJyb29tIjogIiFhYmM6ZXhhbXBsZS5vcmciLCAibiI6IDMsICJvayI6IHRydWUsICJ4IjogbnVsbCwgImxpc3QiOiBbMSwgMl19"
        );
    }

    #[test]
    fn test_sign_escapes_non_ascii() {
        let payload = json!({ "name": "Zoë 😀", "del": "\u{7f}" });
        let token = sign_token("k", &payload).unwrap();
        assert_eq!(
            token,
            "ca033f92780552b1843015c2bf80aa380fe260666149276fccbb4488a4bd98bc:\
             eyJuYW1lIjogIlpvXHUwMGViIFx1ZDgzZFx1ZGUwMCIsICJkZWwiOiAiXHUwMDdmIn0="
        );

        let back: Payload = verify_token("k", &token).unwrap();
        assert_eq!(back["name"], "Zoë 😀");
        assert_eq!(back["del"], "\u{7f}");
    }

    #[test]
    fn test_sign_float_exponents() {
        let token = sign_token("k", &json!({ "f": 1e16, "g": 1e-7 })).unwrap();
        assert_eq!(
            token,
            "e9f9ec99ca65f69b6554e8ddb411099479901ff9461bbd66e28dbd2d9bfba6fe:\
             eyJmIjogMWUrMTYsICJnIjogMWUtMDd9"
        );
    }

    #[test]
    fn test_sign_float_layouts() {
        let payload = json!({
            "a": 1.0,
            "b": -0.0,
            "c": 1e15,
            "d": 0.0001,
            "e": 1e-5,
            "h": -1.5e-7,
            "i": 123.456,
            "j": 1.5e300,
            "k": 0.1,
        });
        let json = to_token_json(&payload).unwrap();
        assert_eq!(
            String::from_utf8(json).unwrap(),
            r#"{"a": 1.0, "b": -0.0, "c": 1000000000000000.0, "d": 0.0001, "e": 1e-05, "h": -1.5e-07, "i": 123.456, "j": 1.5e+300, "k": 0.1}"#
        );

        let token = sign_token("k", &payload).unwrap();
        assert!(token.starts_with(
            "659e72325cac54eab7f9ce92c5b6fccd938311acfadd60d91b109e6240d17d9a:"
        ));
        let back: serde_json::Value = verify_token("k", &token).unwrap();
        assert_eq!(back["e"], 1e-5);
    }

    #[test]
    fn test_float_repr() {
        assert_eq!(float_repr(&format!("{:e}", 12345678901234567890.0f64)), "1.2345678901234567e+19");
        assert_eq!(float_repr(&format!("{:e}", 0.5f32)), "0.5");
        assert_eq!(float_repr(&format!("{:e}", -2.5e-10f64)), "-2.5e-10");
    }

    #[test]
    fn test_round_trip() {
        let payloads = [
            json!({}),
            json!({ "uid": "u1" }),
            json!({ "nested": { "a": [1, 2.5, "three", null, false] }, "colon": "a:b:c" }),
            json!({ "quote": "say \"hi\"\n\tback\\slash" }),
        ];

        for payload in payloads {
            let token = sign_token("secret", &payload).unwrap();
            let back: serde_json::Value = verify_token("secret", &token).unwrap();
            assert_eq!(back, payload);
        }
    }

    #[test]
    fn test_round_trip_typed_payload() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct LoginState {
            mxid: String,
            expires: u64,
        }

        let state = LoginState {
            mxid: "@alice:example.org".into(),
            expires: 1_700_000_000,
        };
        let token = sign_token("secret", &state).unwrap();
        assert_eq!(verify_token::<LoginState>("secret", &token), Some(state));
    }

    #[test]
    fn test_tamper_detection() {
        let bytes = UID_TOKEN.as_bytes();
        for i in 0..bytes.len() {
            let mut mutated = bytes.to_vec();
            mutated[i] = if bytes[i] == b'0' { b'1' } else { b'0' };
            let mutated = String::from_utf8(mutated).unwrap();
            assert!(
                verify_token::<Payload>("secret", &mutated).is_none(),
                "mutation at {} accepted",
                i
            );
        }
    }

    #[test]
    fn test_wrong_key_rejected() {
        let token = sign_token("key-one", &uid_payload()).unwrap();
        assert!(verify_token::<Payload>("key-two", &token).is_none());
        assert!(verify_token::<Payload>("key-one", &token).is_some());
    }

    #[test]
    fn test_malformed_tokens() {
        for token in ["", "not-a-token", "deadbeef", ":", "::::"] {
            assert!(verify_token::<Payload>("secret", token).is_none());
        }
    }

    #[test]
    fn test_extra_colon_is_part_of_payload() {
        // Correct checksum over "eyJ1aWQiOiAidTEifQ==:x", but ':' is not base64
        let encoded = "eyJ1aWQiOiAidTEifQ==:x";
        let token = format!("{}:{}", compute_checksum("secret", encoded.as_bytes()), encoded);
        assert!(verify_token::<Payload>("secret", &token).is_none());
    }

    #[test]
    fn test_valid_checksum_bad_base64() {
        let encoded = "%%%";
        let token = format!("{}:{}", compute_checksum("secret", encoded.as_bytes()), encoded);
        assert!(verify_token::<Payload>("secret", &token).is_none());
    }

    #[test]
    fn test_valid_checksum_bad_json() {
        let encoded = URL_SAFE.encode(b"{not json");
        let token = format!("{}:{}", compute_checksum("secret", encoded.as_bytes()), encoded);
        assert!(verify_token::<Payload>("secret", &token).is_none());
    }

    #[test]
    fn test_non_object_json_is_not_a_payload() {
        let token = sign_token("secret", &json!([1, 2, 3])).unwrap();
        assert!(verify_token::<Payload>("secret", &token).is_none());
        assert!(verify_token::<serde_json::Value>("secret", &token).is_some());
    }

    #[test]
    fn test_unpadded_payload_accepted() {
        let encoded = UID_TOKEN.split_once(':').unwrap().1.trim_end_matches('=');
        let token = format!("{}:{}", compute_checksum("secret", encoded.as_bytes()), encoded);
        assert_eq!(verify_token::<Payload>("secret", &token), Some(uid_payload()));
    }

    #[test]
    fn test_unserializable_payload() {
        let mut bad: HashMap<(u8, u8), u8> = HashMap::new();
        bad.insert((1, 2), 3);
        let err = sign_token("secret", &bad).unwrap_err();
        assert!(matches!(err, Error::SerializationError(_)));
    }

    #[test]
    fn test_codec_uses_its_key() {
        let codec = TokenCodec::new(SigningKey::new("secret").unwrap());
        let token = codec.sign(&uid_payload()).unwrap();
        assert_eq!(token, UID_TOKEN);
        assert_eq!(codec.verify::<Payload>(&token), Some(uid_payload()));

        let other = TokenCodec::new(SigningKey::new("other").unwrap());
        assert!(other.verify::<Payload>(&token).is_none());
    }

    #[test]
    fn test_signing_key_rules() {
        assert!(matches!(SigningKey::new(""), Err(Error::InvalidKey(_))));
        let key = SigningKey::new("hunter2").unwrap();
        assert_eq!(format!("{:?}", key), "SigningKey([REDACTED])");
        assert_eq!(key.as_str(), "hunter2");
    }

    #[test]
    fn test_signing_key_optional() {
        assert!(SigningKey::from_optional(None).unwrap().is_none());
        assert!(matches!(
            SigningKey::from_optional(Some(String::new())),
            Err(Error::InvalidKey(_))
        ));
        let key = SigningKey::from_optional(Some("k".into())).unwrap().unwrap();
        assert_eq!(key.as_str(), "k");
    }

    // The only test that touches BRIDGE_TOKEN_SECRET in the process env.
    #[test]
    fn test_signing_key_from_env() {
        std::env::set_var(TOKEN_SECRET_ENV, "from-env");
        let key = SigningKey::from_env().unwrap().unwrap();
        assert_eq!(key.as_str(), "from-env");

        std::env::remove_var(TOKEN_SECRET_ENV);
        assert!(SigningKey::from_env().unwrap().is_none());
    }
}
