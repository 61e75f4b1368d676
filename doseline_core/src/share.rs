//! Shareable links.
//!
//! A link carries both tables in its fragment: each table snapshot is JSON
//! encoded, the two are joined as `multiDoseTable=..&steadyStateTable=..`
//! with percent-encoded values, and the whole query string is Base64
//! encoded (standard alphabet, padded).

use crate::snapshot::{RegimenSnapshot, TableSnapshot};
use crate::store::{MULTIDOSE_KEY, STEADY_STATE_KEY};
use crate::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Encode both tables into a fragment token
pub fn encode_token(snapshot: &RegimenSnapshot) -> Result<String> {
    let mut pairs = Vec::new();
    for (key, table) in [
        (MULTIDOSE_KEY, &snapshot.multidose),
        (STEADY_STATE_KEY, &snapshot.steady_state),
    ] {
        if let Some(table) = table {
            pairs.push(format!("{}={}", key, urlencoding::encode(&table.to_json()?)));
        }
    }
    Ok(STANDARD.encode(pairs.join("&")))
}

/// `<base>#<token>`, replacing any fragment already on `base`
pub fn share_url(base: &str, token: &str) -> String {
    let base = base.split_once('#').map_or(base, |(head, _)| head);
    format!("{}#{}", base, token)
}

/// The fragment of a link, or the input itself when it has no `#`
pub fn fragment_of(link: &str) -> &str {
    link.split_once('#').map_or(link, |(_, fragment)| fragment).trim()
}

/// Padded standard Base64: groups of four alphabet characters, with at
/// most two `=` at the very end.
pub fn is_valid_base64(text: &str) -> bool {
    if text.len() % 4 != 0 {
        return false;
    }
    let body = text.trim_end_matches('=');
    if text.len() - body.len() > 2 {
        return false;
    }
    body.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
}

/// Decode a fragment token.
///
/// Anything that is not Base64, not UTF-8, or carries no decodable table is
/// a miss.
pub fn decode_token(fragment: &str) -> Option<RegimenSnapshot> {
    let fragment = fragment.trim_start_matches('#');
    if fragment.is_empty() || !is_valid_base64(fragment) {
        tracing::debug!("Fragment is not a share token");
        return None;
    }

    let bytes = match STANDARD.decode(fragment) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Share token failed to decode: {}", e);
            return None;
        }
    };
    let query = String::from_utf8(bytes).ok()?;

    let mut snapshot = RegimenSnapshot::default();
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = value.replace('+', " ");
        let Ok(json) = urlencoding::decode(&value) else {
            tracing::warn!("Share token value for {} is not valid UTF-8", key);
            continue;
        };
        match key {
            MULTIDOSE_KEY => snapshot.multidose = TableSnapshot::from_json(&json),
            STEADY_STATE_KEY => snapshot.steady_state = TableSnapshot::from_json(&json),
            other => tracing::debug!("Ignoring unknown share key {}", other),
        }
    }

    if snapshot.is_empty() {
        None
    } else {
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{restore, snapshot};
    use crate::state::RegimenState;
    use crate::types::{DeliveryMethod, EntryDraft, TimeValue};

    fn state() -> RegimenState {
        let mut state = RegimenState::blank();
        state.multidose.fill_scratch(EntryDraft::new(
            TimeValue::Date("2024-01-10".into()),
            4.0,
            DeliveryMethod::EvIm,
        ));
        state
    }

    #[test]
    fn test_base64_check() {
        assert!(is_valid_base64("YWJj"));
        assert!(is_valid_base64("YWI="));
        assert!(is_valid_base64("YQ=="));
        assert!(!is_valid_base64("YQ"));
        assert!(!is_valid_base64("Y==="));
        assert!(!is_valid_base64("YW=j"));
        assert!(!is_valid_base64("YWJ!"));
    }

    #[test]
    fn test_bang_fragment_is_absent_and_state_unmodified() {
        let mut state = state();
        let before = state.clone();

        let decoded = decode_token("abc!");
        assert!(decoded.is_none());
        if let Some(snapshot) = decoded {
            restore(&mut state, &snapshot);
        }
        assert_eq!(state, before);
    }

    #[test]
    fn test_token_layout() {
        let token = encode_token(&snapshot(&state())).unwrap();
        let query = String::from_utf8(STANDARD.decode(&token).unwrap()).unwrap();
        assert!(query.starts_with("multiDoseTable=%5B%5B%222024-01-10%22"));
        assert!(query.contains("&steadyStateTable="));
    }

    #[test]
    fn test_plus_decodes_as_space() {
        // a form-encoded value: [["2024-01-10 06:00"],[4],["EV im"],[true],[true]]
        let query = "multiDoseTable=%5B%5B%222024-01-10+06%3A00%22%5D%2C%5B4%5D%2C%5B%22EV+im%22%5D%2C%5Btrue%5D%2C%5Btrue%5D%5D";
        let token = STANDARD.encode(query);
        let snapshot = decode_token(&token).unwrap();
        let table = snapshot.multidose.unwrap();
        assert_eq!(table.times[0], Some(TimeValue::Date("2024-01-10 06:00".into())));
        assert_eq!(table.methods[0], DeliveryMethod::EvIm);
        assert!(snapshot.steady_state.is_none());
    }

    #[test]
    fn test_undecodable_payloads_are_absent() {
        assert!(decode_token("").is_none());
        // valid base64 of "hello" carries no tables
        assert!(decode_token(&STANDARD.encode("hello")).is_none());
        // invalid UTF-8
        assert!(decode_token(&STANDARD.encode([0xff, 0xfe, 0xfd])).is_none());
        // bad JSON
        assert!(decode_token(&STANDARD.encode("multiDoseTable=%5B")).is_none());
    }

    #[test]
    fn test_share_url() {
        assert_eq!(share_url("https://x.test/app/", "YWJj"), "https://x.test/app/#YWJj");
        assert_eq!(share_url("https://x.test/#old", "YWJj"), "https://x.test/#YWJj");
        assert_eq!(fragment_of("https://x.test/#YWJj"), "YWJj");
        assert_eq!(fragment_of("YWJj"), "YWJj");
    }
}
