use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);
    };
}

id_newtype!(SampleIndex);

/// Rater judgment on one sample. Wire encoding keeps the legacy
/// small-integer scheme; "unset" is the absence of the field, never a
/// fifth code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Verdict {
    Good,
    Bad,
    Poor,
    Error,
}

impl From<Verdict> for i8 {
    fn from(value: Verdict) -> Self {
        match value {
            Verdict::Good => 1,
            Verdict::Bad => 0,
            Verdict::Poor => 2,
            Verdict::Error => -1,
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown verdict code {0}")]
pub struct UnknownVerdictCode(pub i8);

impl TryFrom<i8> for Verdict {
    type Error = UnknownVerdictCode;

    fn try_from(value: i8) -> Result<Self, UnknownVerdictCode> {
        match value {
            1 => Ok(Verdict::Good),
            0 => Ok(Verdict::Bad),
            2 => Ok(Verdict::Poor),
            -1 => Ok(Verdict::Error),
            other => Err(UnknownVerdictCode(other)),
        }
    }
}

/// One reviewed unit: a page's original rendering vs. its distilled
/// rendering, plus the rater's verdict.
///
/// `index` is a stable identity independent of the sample's position in
/// the corpus; it is unique and never reassigned. `verdict` is the only
/// field mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub index: SampleIndex,
    pub url: String,
    pub screenshot: String,
    pub distilled: String,
    #[serde(rename = "good", default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerdictCounts {
    pub good: usize,
    pub bad: usize,
    pub poor: usize,
    pub error: usize,
    pub unrated: usize,
}

impl VerdictCounts {
    pub fn tally(samples: &[Sample]) -> Self {
        let mut counts = Self::default();
        for sample in samples {
            match sample.verdict {
                Some(Verdict::Good) => counts.good += 1,
                Some(Verdict::Bad) => counts.bad += 1,
                Some(Verdict::Poor) => counts.poor += 1,
                Some(Verdict::Error) => counts.error += 1,
                None => counts.unrated += 1,
            }
        }
        counts
    }

    pub fn rated(&self) -> usize {
        self.good + self.bad + self.poor + self.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(index: u64, verdict: Option<Verdict>) -> Sample {
        Sample {
            index: SampleIndex(index),
            url: format!("http://example.com/{index}"),
            screenshot: format!("shots/{index}.png"),
            distilled: format!("shots/{index}-distilled.png"),
            verdict,
        }
    }

    #[test]
    fn verdict_wire_codes_round_trip_the_legacy_integers() {
        for (verdict, code) in [
            (Verdict::Good, 1i8),
            (Verdict::Bad, 0),
            (Verdict::Poor, 2),
            (Verdict::Error, -1),
        ] {
            assert_eq!(i8::from(verdict), code);
            assert_eq!(Verdict::try_from(code).unwrap(), verdict);
        }
        assert!(Verdict::try_from(3).is_err());
    }

    #[test]
    fn unset_verdict_is_an_absent_field() {
        let rated = serde_json::to_value(sample(7, Some(Verdict::Good))).unwrap();
        assert_eq!(rated["good"], 1);

        let unrated = serde_json::to_value(sample(7, None)).unwrap();
        assert!(unrated.get("good").is_none());

        let parsed: Sample =
            serde_json::from_str(r#"{"index":7,"url":"u","screenshot":"s","distilled":"d"}"#)
                .unwrap();
        assert_eq!(parsed.verdict, None);
    }

    #[test]
    fn counts_tally_each_state() {
        let samples = vec![
            sample(0, Some(Verdict::Good)),
            sample(1, Some(Verdict::Good)),
            sample(2, Some(Verdict::Bad)),
            sample(3, Some(Verdict::Poor)),
            sample(4, Some(Verdict::Error)),
            sample(5, None),
        ];
        let counts = VerdictCounts::tally(&samples);
        assert_eq!(counts.good, 2);
        assert_eq!(counts.bad, 1);
        assert_eq!(counts.poor, 1);
        assert_eq!(counts.error, 1);
        assert_eq!(counts.unrated, 1);
        assert_eq!(counts.rated(), 5);
    }
}
