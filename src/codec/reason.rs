//! Reason code enumerations and their packet-category membership.
//!
//! The wire value is preserved as-is (`u8`); category membership is what
//! determines whether a given reason code is legal in a given packet type.

/// The category a reason code must belong to, used to validate reason
/// codes found in PUBACK/PUBREC/PUBREL/PUBCOMP/SUBACK/UNSUBACK/CONNACK/AUTH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCategory {
    /// PUBACK / PUBREC reason codes.
    PubAckOrRec,
    /// PUBREL / PUBCOMP reason codes.
    PubRelOrComp,
    /// SUBACK reason codes.
    SubAck,
    /// UNSUBACK reason codes.
    UnsubAck,
    /// CONNACK reason codes.
    ConnAck,
    /// AUTH reason codes.
    Auth,
    /// DISCONNECT reason codes.
    Disconnect,
}

/// Returns `true` if `code` is a legal member of `category`.
#[must_use]
pub fn is_valid(category: ReasonCategory, code: u8) -> bool {
    match category {
        ReasonCategory::PubAckOrRec => matches!(
            code,
            0x00 | 0x10 | 0x80 | 0x83 | 0x87 | 0x90 | 0x91 | 0x97 | 0x99
        ),
        ReasonCategory::PubRelOrComp => matches!(code, 0x00 | 0x92),
        ReasonCategory::SubAck => matches!(
            code,
            0x00 | 0x01
                | 0x02
                | 0x80
                | 0x83
                | 0x87
                | 0x8F
                | 0x90
                | 0x91
                | 0x97
                | 0x9A
                | 0x9B
                | 0x9C
                | 0x9E
                | 0xA1
                | 0xA2
        ),
        ReasonCategory::UnsubAck => matches!(
            code,
            0x00 | 0x11 | 0x80 | 0x83 | 0x87 | 0x8F | 0x91
        ),
        ReasonCategory::ConnAck => matches!(
            code,
            0x00 | 0x80
                | 0x81
                | 0x82
                | 0x83
                | 0x84
                | 0x85
                | 0x86
                | 0x87
                | 0x88
                | 0x89
                | 0x8A
                | 0x8C
                | 0x90
                | 0x95
                | 0x97
                | 0x99
                | 0x9A
                | 0x9B
                | 0x9C
                | 0x9D
                | 0x9F
        ),
        ReasonCategory::Auth => matches!(code, 0x00 | 0x18 | 0x19),
        ReasonCategory::Disconnect => matches!(
            code,
            0x00 | 0x04
                | 0x19
                | 0x80
                | 0x81
                | 0x82
                | 0x83
                | 0x87
                | 0x89
                | 0x8A
                | 0x8B
                | 0x8D
                | 0x8F
                | 0x90
                | 0x93
                | 0x94
                | 0x95
                | 0x96
                | 0x97
                | 0x98
                | 0x99
                | 0x9A
                | 0x9B
                | 0x9C
                | 0x9D
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn puback_rejects_unlisted_code() {
        // Used by scenario S5: reason 0x04 is not a PUBACK-category code.
        assert!(!is_valid(ReasonCategory::PubAckOrRec, 0x04));
        assert!(is_valid(ReasonCategory::PubAckOrRec, 0x00));
        assert!(is_valid(ReasonCategory::PubAckOrRec, 0x91));
    }

    #[test]
    fn connack_retryable_codes_are_all_above_0x80() {
        for code in 0x80u8..=0x9F {
            if is_valid(ReasonCategory::ConnAck, code) {
                assert!(code >= 0x80);
            }
        }
    }
}
