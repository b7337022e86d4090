//! Health declaration ("declaração de saúde") questions
//!
//! The question list is fixed configuration; answers reference questions by
//! their 1-based number.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ProposalError;

/// Number of questions in the declaration
pub const QUESTION_COUNT: usize = 21;

pub static HEALTH_QUESTIONS: [&str; QUESTION_COUNT] = [
    "Possui ou já possuiu doença cardíaca, hipertensão ou outra doença do aparelho circulatório?",
    "Possui ou já possuiu diabetes ou outra doença endócrina ou metabólica?",
    "Possui ou já possuiu câncer, tumor ou nódulo de qualquer natureza?",
    "Possui ou já possuiu doença pulmonar, asma, bronquite ou enfisema?",
    "Possui ou já possuiu doença renal ou das vias urinárias?",
    "Possui ou já possuiu doença do fígado, vesícula, pâncreas ou aparelho digestivo?",
    "Possui ou já possuiu doença neurológica, epilepsia ou acidente vascular cerebral?",
    "Possui ou já possuiu transtorno psiquiátrico ou faz tratamento psicológico contínuo?",
    "Possui ou já possuiu doença da coluna, articulações, ossos ou músculos?",
    "Possui ou já possuiu doença dos olhos, incluindo catarata, glaucoma ou ceratocone?",
    "Possui ou já possuiu doença de ouvido, nariz ou garganta?",
    "Possui ou já possuiu doença ginecológica, de mama ou de próstata?",
    "Possui ou já possuiu doença do sangue, anemia ou distúrbio de coagulação?",
    "Possui ou já possuiu doença infecciosa crônica, incluindo HIV ou hepatites virais?",
    "Possui hérnia, varizes ou hemorroidas?",
    "Possui deficiência física, visual, auditiva ou doença congênita?",
    "Possui obesidade (IMC igual ou superior a 35)?",
    "Realizou cirurgia ou foi internado nos últimos cinco anos?",
    "Tem cirurgia, exame invasivo ou tratamento indicado ou programado?",
    "Faz uso contínuo de medicamento?",
    "Está grávida no momento?",
];

/// Text of question `number` (1-based)
pub fn question(number: u8) -> Option<&'static str> {
    (number as usize)
        .checked_sub(1)
        .and_then(|idx| HEALTH_QUESTIONS.get(idx))
        .copied()
}

/// One answered question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthAnswer {
    /// 1-based question number
    pub question: u8,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl HealthAnswer {
    pub fn new(question: u8, answer: impl Into<String>) -> Self {
        Self {
            question,
            answer: answer.into(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Check question numbers exist, appear once and carry an answer
pub fn validate_answers(answers: &[HealthAnswer]) -> Result<(), ProposalError> {
    let mut seen = HashSet::new();

    for answer in answers {
        if question(answer.question).is_none() {
            return Err(ProposalError::Validation(format!(
                "health question {} does not exist (1-{})",
                answer.question, QUESTION_COUNT
            )));
        }
        if !seen.insert(answer.question) {
            return Err(ProposalError::Validation(format!(
                "health question {} answered twice",
                answer.question
            )));
        }
        if answer.answer.trim().is_empty() {
            return Err(ProposalError::Validation(format!(
                "health question {} has an empty answer",
                answer.question
            )));
        }
    }

    Ok(())
}
