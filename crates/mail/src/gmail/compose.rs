//! Raw RFC 2822 message composition for `users.messages.send`

use base64::prelude::*;

use crate::models::OutgoingEmail;

/// Build the message text and encode it as unpadded base64url
pub fn encode_raw_message(email: &OutgoingEmail) -> String {
    let raw = format!(
        "To: {}\nSubject: {}\n\n{}",
        header_value(&email.to),
        header_value(&email.subject),
        email.body
    );
    BASE64_URL_SAFE_NO_PAD.encode(raw.as_bytes())
}

/// Header values must stay on one line
fn header_value(value: &str) -> String {
    value
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(raw: &str) -> String {
        String::from_utf8(BASE64_URL_SAFE_NO_PAD.decode(raw).unwrap()).unwrap()
    }

    #[test]
    fn test_encode_raw_message_layout() {
        let email = OutgoingEmail::new("bob@example.com", "Re: Lunch", "Sounds good.\nSee you.");
        let raw = encode_raw_message(&email);

        assert!(!raw.contains('='));
        assert!(!raw.contains('+'));
        assert!(!raw.contains('/'));
        assert_eq!(
            decode(&raw),
            "To: bob@example.com\nSubject: Re: Lunch\n\nSounds good.\nSee you."
        );
    }

    #[test]
    fn test_header_injection_is_flattened() {
        let email = OutgoingEmail::new("a@example.com\r\nBcc: evil@example.com", "Hi", "body");
        let decoded = decode(&encode_raw_message(&email));

        assert!(decoded.starts_with("To: a@example.com Bcc: evil@example.com\nSubject: Hi\n"));
    }
}
