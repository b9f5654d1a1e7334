//! Scorer seam and the French lexicon fallback.

use async_trait::async_trait;
use veille_core::{Sentiment, SentimentLabel};

use crate::error::SentimentError;

#[async_trait]
pub trait SentimentScorer: Send + Sync {
    fn name(&self) -> &str;

    /// Label `text` with a tonality and a confidence in `[0.0, 1.0]`.
    async fn score(&self, text: &str) -> Result<Sentiment, SentimentError>;
}

/// Word weights for Nigerien French-language press.
///
/// Keys are lowercase single words. Values in `(0.0, 1.0]` are positive,
/// in `[-1.0, 0.0)` are negative.
pub(crate) const LEXICON: &[(&str, f32)] = &[
    // Positive signals
    ("succès", 0.5),
    ("réussite", 0.5),
    ("progrès", 0.4),
    ("hausse", 0.2),
    ("amélioration", 0.4),
    ("accord", 0.3),
    ("paix", 0.5),
    ("inauguration", 0.4),
    ("inaugure", 0.4),
    ("lancement", 0.3),
    ("développement", 0.3),
    ("croissance", 0.4),
    ("investissement", 0.3),
    ("partenariat", 0.3),
    ("coopération", 0.3),
    ("soutien", 0.3),
    ("victoire", 0.5),
    ("record", 0.3),
    ("libération", 0.4),
    ("stabilité", 0.4),
    ("récolte", 0.2),
    ("excellent", 0.5),
    ("bon", 0.2),
    ("bonne", 0.2),
    ("positif", 0.4),
    ("favorable", 0.4),
    // Negative signals
    ("attaque", -0.7),
    ("attentat", -0.8),
    ("terroriste", -0.6),
    ("terroristes", -0.6),
    ("insécurité", -0.6),
    ("violence", -0.6),
    ("violences", -0.6),
    ("morts", -0.7),
    ("tués", -0.7),
    ("victimes", -0.5),
    ("enlèvement", -0.6),
    ("crise", -0.5),
    ("pénurie", -0.5),
    ("famine", -0.7),
    ("inondation", -0.5),
    ("inondations", -0.5),
    ("sécheresse", -0.5),
    ("épidémie", -0.6),
    ("choléra", -0.6),
    ("paludisme", -0.3),
    ("corruption", -0.6),
    ("détournement", -0.5),
    ("grève", -0.4),
    ("manifestation", -0.2),
    ("sanctions", -0.4),
    ("baisse", -0.2),
    ("échec", -0.5),
    ("condamnation", -0.4),
    ("arrestation", -0.3),
    ("menace", -0.4),
    ("conflit", -0.5),
    ("coupure", -0.3),
    ("délestage", -0.3),
    ("négatif", -0.4),
];

/// Magnitude below which a score counts as neutral.
const NEUTRAL_BAND: f32 = 0.15;

/// Sum the lexicon weights of the words in `text`, clamped to `[-1.0, 1.0]`.
///
/// Elisions split words, so `l'insécurité` matches `insécurité`.
#[must_use]
pub fn lexicon_score(text: &str) -> f32 {
    let mut score = 0.0_f32;
    for word in text.split(|c: char| !c.is_alphabetic()) {
        if word.is_empty() {
            continue;
        }
        let w = word.to_lowercase();
        if let Some(&(_, weight)) = LEXICON.iter().find(|(lex, _)| *lex == w) {
            score += weight;
        }
    }
    score.clamp(-1.0, 1.0)
}

/// Offline scorer over [`LEXICON`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    #[must_use]
    pub fn classify(score: f32) -> Sentiment {
        if score > NEUTRAL_BAND {
            Sentiment {
                label: SentimentLabel::Positive,
                confidence: 0.5 + score / 2.0,
            }
        } else if score < -NEUTRAL_BAND {
            Sentiment {
                label: SentimentLabel::Negative,
                confidence: 0.5 - score / 2.0,
            }
        } else {
            Sentiment {
                label: SentimentLabel::Neutral,
                confidence: 1.0 - score.abs(),
            }
        }
    }
}

#[async_trait]
impl SentimentScorer for LexiconScorer {
    fn name(&self) -> &str {
        "lexicon"
    }

    async fn score(&self, text: &str) -> Result<Sentiment, SentimentError> {
        Ok(Self::classify(lexicon_score(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_text_returns_zero() {
        assert_eq!(lexicon_score(""), 0.0);
        assert_eq!(lexicon_score("le conseil des ministres"), 0.0);
    }

    #[test]
    fn negative_press_scores_negative() {
        let score = lexicon_score("Attaque terroriste à Tillabéri : plusieurs morts");
        assert!(score < 0.0, "expected negative, got {score}");
    }

    #[test]
    fn elision_and_case_are_handled() {
        assert!(lexicon_score("L'insécurité persiste") < 0.0);
        assert!(lexicon_score("SUCCÈS de la campagne") > 0.0);
    }

    #[test]
    fn score_clamps() {
        let text = "attentat attaque morts tués famine épidémie";
        assert_eq!(lexicon_score(text), -1.0);
        let text = "succès réussite victoire paix excellent";
        assert_eq!(lexicon_score(text), 1.0);
    }

    #[test]
    fn classify_bands() {
        assert_eq!(LexiconScorer::classify(0.6).label, SentimentLabel::Positive);
        assert_eq!(LexiconScorer::classify(-0.6).label, SentimentLabel::Negative);
        let neutral = LexiconScorer::classify(0.1);
        assert_eq!(neutral.label, SentimentLabel::Neutral);
        assert!((neutral.confidence - 0.9).abs() < 1e-6);
        assert!((LexiconScorer::classify(-1.0).confidence - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn scorer_labels_french_text() {
        let s = LexiconScorer
            .score("Inondations meurtrières à Niamey, des victimes")
            .await
            .unwrap();
        assert_eq!(s.label, SentimentLabel::Negative);
        assert!(s.confidence > 0.5 && s.confidence <= 1.0);
    }
}
