//! Minimal SDP inspection used to vet an answer against the local offer.

/// One `m=` section of a session description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSection {
    /// Media kind from the `m=` line (`application`, `audio`, ...)
    pub kind: String,
    /// Value of the section's `a=mid:` attribute, if any
    pub mid: Option<String>,
}

/// Extracts the media sections of a description in order.
///
/// Lines may be separated by `\r\n` or `\n` and carry leading indentation.
pub fn media_sections(sdp: &str) -> Vec<MediaSection> {
    let mut sections: Vec<MediaSection> = Vec::new();
    for line in sdp.lines().map(str::trim) {
        if let Some(media) = line.strip_prefix("m=") {
            sections.push(MediaSection {
                kind: media.split_whitespace().next().unwrap_or_default().to_string(),
                mid: None,
            });
        } else if let Some(mid) = line.strip_prefix("a=mid:") {
            if let Some(section) = sections.last_mut() {
                section.mid = Some(mid.trim().to_string());
            }
        }
    }
    sections
}

/// Checks that `answer` is a well-formed description whose media sections
/// line up with `offer`: same count, same kinds, and equal mids where both
/// sides declare one.
pub fn check_answer(offer: &str, answer: &str) -> Result<(), String> {
    let first = answer.lines().map(str::trim).find(|l| !l.is_empty());
    if first != Some("v=0") {
        return Err("answer is not a session description (missing v=0)".to_string());
    }

    let offered = media_sections(offer);
    let answered = media_sections(answer);
    if answered.is_empty() {
        return Err("answer has no media sections".to_string());
    }
    if offered.len() != answered.len() {
        return Err(format!(
            "media sections in answer do not match offer: {} offered, {} answered",
            offered.len(),
            answered.len()
        ));
    }

    for (index, (o, a)) in offered.iter().zip(&answered).enumerate() {
        if o.kind != a.kind {
            return Err(format!(
                "media sections in answer do not match offer: section {} is {} in offer, {} in answer",
                index, o.kind, a.kind
            ));
        }
        if let (Some(om), Some(am)) = (&o.mid, &a.mid) {
            if om != am {
                return Err(format!(
                    "media sections in answer do not match offer: section {} mid {} vs {}",
                    index, om, am
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFER: &str = "v=0\r\no=- 12345 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\na=group:BUNDLE 0\r\nm=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\nc=IN IP4 0.0.0.0\r\na=mid:0\r\na=sctp-port:5000\r\n";

    #[test]
    fn test_media_sections_indented() {
        let sdp = "v=0
        o=- 12345 2 IN IP4 127.0.0.1
        m=audio 9 UDP/TLS/RTP/SAVPF 111
        a=mid:audio
        m=application 9 UDP/DTLS/SCTP webrtc-datachannel
        a=mid:data";
        assert_eq!(
            media_sections(sdp),
            vec![
                MediaSection {
                    kind: "audio".to_string(),
                    mid: Some("audio".to_string()),
                },
                MediaSection {
                    kind: "application".to_string(),
                    mid: Some("data".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_matching_answer() {
        let answer = OFFER.replace("o=- 12345", "o=- 67890");
        assert!(check_answer(OFFER, &answer).is_ok());
    }

    #[test]
    fn test_mismatched_answers() {
        assert!(check_answer(OFFER, "test_sdp_answer").is_err());
        assert!(check_answer(OFFER, "v=0\r\ns=-\r\n").is_err());
        assert!(check_answer(OFFER, &OFFER.replace("m=application", "m=audio")).is_err());
        assert!(check_answer(OFFER, &OFFER.replace("a=mid:0", "a=mid:1")).is_err());
        let doubled = format!("{OFFER}m=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=mid:1\r\n");
        assert!(check_answer(OFFER, &doubled).is_err());
    }
}
