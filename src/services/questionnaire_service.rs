use serde_json::{Map, Value};
use sqlx::MySqlPool;
use thiserror::Error;
use tracing::info;

use crate::database::query_builder::QueryBuilder;
use crate::database::values::{as_i64, now_mysql, row_to_json, rows_to_json};
use crate::database::DatabaseError;
use crate::types::RecordStatus;

const ANSWER_COLUMNS: &[&str] = &[
    "RQU_IdRif_Questionari",
    "RQU_IdRif_DomandeQuestionari",
    "RQU_IdRif_RisposteProposte",
    "RQU_TerminaleInserimento",
    "RQU_DataOraInserimento",
    "RQU_TestoRisposta",
    "RQU_InizioValidita",
    "RQU_StatoRecord",
    "RQU_Utente",
    "RQU_Terminale",
];

#[derive(Debug, Error)]
pub enum QuestionnaireError {
    #[error("Questionario non trovato")]
    NotFound,

    #[error("Questionario non trovato con la descrizione fornita.")]
    DescriptionNotFound,

    #[error("Nessuna domanda trovata per questo questionario.")]
    NoQuestions,

    #[error("{0}")]
    InvalidAnswers(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for QuestionnaireError {
    fn from(err: sqlx::Error) -> Self {
        QuestionnaireError::Database(DatabaseError::Sqlx(err))
    }
}

pub struct QuestionnaireService {
    pool: MySqlPool,
}

impl QuestionnaireService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Active questionnaire with its questions, each carrying its proposed answers
    pub async fn questionnaire(&self, id: &str) -> Result<Value, QuestionnaireError> {
        let header = sqlx::query(
            "SELECT q.QUE_IdRif_Questionari, q.QUE_Descrizione, q.QUE_Sottotitoli \
             FROM ANS_Questionari q \
             WHERE q.QUE_IdRif_Questionari = ? AND q.QUE_StatoRecord = 'A' \
             LIMIT 1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(QuestionnaireError::NotFound)?;

        let questions = sqlx::query(
            "SELECT d.DQU_IdRif_DomandeQuestionari AS DOM_IdRif_DomandeQuestionari, \
                    d.DQU_TestoDomanda AS DOM_Descrizione, d.DQU_Id_TipiDomande AS DOM_TipoDomanda \
             FROM ANS_DomandeQuestionari d \
             WHERE d.DQU_IdRif_Questionari = ? AND d.DQU_StatoRecord = 'A'",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let proposed = sqlx::query(
            "SELECT r.RPR_IdRif_RisposteProposte, r.RPR_IdRif_DomandeQuestionari, r.RPR_TestoRisposta, r.RPR_Ordinamento \
             FROM CNF_RisposteProposte r \
             WHERE r.RPR_StatoRecord = 'A' \
               AND r.RPR_IdRif_DomandeQuestionari IN ( \
                 SELECT DQU_IdRif_DomandeQuestionari FROM ANS_DomandeQuestionari \
                 WHERE DQU_IdRif_Questionari = ? AND DQU_StatoRecord = 'A') \
             ORDER BY r.RPR_IdRif_DomandeQuestionari, r.RPR_Ordinamento",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut questionnaire = row_to_json(&header);
        questionnaire.insert(
            "domande".to_string(),
            Value::Array(attach_proposed_answers(rows_to_json(&questions), rows_to_json(&proposed))),
        );
        Ok(Value::Object(questionnaire))
    }

    /// Store a completed questionnaire in one multi-row insert; returns the row count
    pub async fn submit_answers(
        &self,
        questionnaire_id: &str,
        answers: &[Value],
        terminal: &str,
    ) -> Result<usize, QuestionnaireError> {
        let rows = answer_rows(questionnaire_id, answers, terminal, &now_mysql())?;
        let count = rows.len();
        let sql = QueryBuilder::insert_many("ANS_RisposteQuestionari", ANSWER_COLUMNS, rows)?;
        QueryBuilder::bind(&sql).execute(&self.pool).await?;
        info!("Stored {} answers for questionnaire {} from {}", count, questionnaire_id, terminal);
        Ok(count)
    }

    /// Question texts of the questionnaire active under `description`, numbered from 1
    pub async fn questions_mapping(&self, description: &str) -> Result<Vec<Value>, QuestionnaireError> {
        let questionnaire = sqlx::query(
            "SELECT CAST(QUE_IdRif_Questionari AS SIGNED) AS id FROM ANS_Questionari \
             WHERE QUE_Descrizione = ? AND QUE_StatoRecord = 'A' LIMIT 1",
        )
        .bind(description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(QuestionnaireError::DescriptionNotFound)?;
        let id = row_to_json(&questionnaire)
            .get("id")
            .cloned()
            .unwrap_or(Value::Null);

        let rows = sqlx::query(
            "SELECT DQU_TestoDomanda FROM ANS_DomandeQuestionari \
             WHERE DQU_IdRif_Questionari = ? AND DQU_StatoRecord = 'A' \
             ORDER BY DQU_IdRif_DomandeQuestionari ASC",
        )
        .bind(as_i64(&id))
        .fetch_all(&self.pool)
        .await?;
        if rows.is_empty() {
            return Err(QuestionnaireError::NoQuestions);
        }

        let texts = rows_to_json(&rows)
            .into_iter()
            .map(|q| q.get("DQU_TestoDomanda").and_then(Value::as_str).unwrap_or_default().to_string())
            .collect();
        Ok(number_questions(texts))
    }
}

/// Give every question the proposed answers that point at it
pub fn attach_proposed_answers(questions: Vec<Value>, proposed: Vec<Value>) -> Vec<Value> {
    questions
        .into_iter()
        .map(|mut question| {
            let id = question.get("DOM_IdRif_DomandeQuestionari").and_then(as_i64);
            let answers: Vec<Value> = proposed
                .iter()
                .filter(|a| id.is_some() && a.get("RPR_IdRif_DomandeQuestionari").and_then(as_i64) == id)
                .cloned()
                .collect();
            if let Value::Object(obj) = &mut question {
                obj.insert("risposte".to_string(), Value::Array(answers));
            }
            question
        })
        .collect()
}

pub fn number_questions(texts: Vec<String>) -> Vec<Value> {
    texts
        .into_iter()
        .enumerate()
        .map(|(i, domanda)| serde_json::json!({"indice": i + 1, "domanda": domanda}))
        .collect()
}

/// Insert rows for submitted answers, in `ANSWER_COLUMNS` order
pub fn answer_rows(
    questionnaire_id: &str,
    answers: &[Value],
    terminal: &str,
    now: &str,
) -> Result<Vec<Vec<Value>>, QuestionnaireError> {
    if answers.is_empty() {
        return Err(QuestionnaireError::InvalidAnswers("Dati delle risposte mancanti o non validi.".to_string()));
    }
    let path_id = questionnaire_id.trim().parse::<i64>().ok().map(Value::from);

    answers
        .iter()
        .enumerate()
        .map(|(i, answer)| {
            let empty = Map::new();
            let answer = answer.as_object().unwrap_or(&empty);
            let field = |name: &str| answer.get(name).filter(|v| !v.is_null()).cloned();

            let question = field("RQU_IdRif_DomandeQuestionari").ok_or_else(|| {
                QuestionnaireError::InvalidAnswers(format!("Risposta {}: RQU_IdRif_DomandeQuestionari mancante", i + 1))
            })?;
            let questionnaire = field("RQU_IdRif_Questionari").or_else(|| path_id.clone()).ok_or_else(|| {
                QuestionnaireError::InvalidAnswers(format!("Risposta {}: RQU_IdRif_Questionari mancante", i + 1))
            })?;

            Ok(vec![
                questionnaire,
                question,
                field("RQU_IdRif_RisposteProposte").unwrap_or(Value::Null),
                Value::from(terminal),
                Value::from(now),
                field("RQU_TestoRisposta").unwrap_or(Value::Null),
                Value::from(now),
                Value::from(RecordStatus::Active.code()),
                Value::from(0),
                Value::from(terminal),
            ])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn answers_default_to_path_questionnaire() {
        let rows = answer_rows(
            "12",
            &[
                json!({"RQU_IdRif_DomandeQuestionari": 3, "RQU_IdRif_RisposteProposte": 9}),
                json!({"RQU_IdRif_Questionari": 14, "RQU_IdRif_DomandeQuestionari": 4, "RQU_TestoRisposta": "Ottimo"}),
            ],
            "10.1.1.5",
            "2024-06-01 09:00:00",
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), ANSWER_COLUMNS.len());
        assert_eq!(rows[0][0], json!(12));
        assert_eq!(rows[0][2], json!(9));
        assert_eq!(rows[0][5], Value::Null);
        assert_eq!(rows[0][7], json!("A"));
        assert_eq!(rows[1][0], json!(14));
        assert_eq!(rows[1][5], json!("Ottimo"));
        assert_eq!(rows[1][9], json!("10.1.1.5"));
    }

    #[test]
    fn answers_require_a_question() {
        assert!(matches!(answer_rows("1", &[], "t", "n"), Err(QuestionnaireError::InvalidAnswers(_))));
        assert!(matches!(
            answer_rows("1", &[json!({"RQU_TestoRisposta": "x"})], "t", "n"),
            Err(QuestionnaireError::InvalidAnswers(m)) if m.contains("RQU_IdRif_DomandeQuestionari")
        ));
        assert!(matches!(
            answer_rows("abc", &[json!({"RQU_IdRif_DomandeQuestionari": 1})], "t", "n"),
            Err(QuestionnaireError::InvalidAnswers(m)) if m.contains("RQU_IdRif_Questionari")
        ));
    }

    #[test]
    fn proposed_answers_follow_their_question() {
        let questions = vec![
            json!({"DOM_IdRif_DomandeQuestionari": 1, "DOM_Descrizione": "Accoglienza"}),
            json!({"DOM_IdRif_DomandeQuestionari": 2, "DOM_Descrizione": "Pulizia"}),
        ];
        let proposed = vec![
            json!({"RPR_IdRif_DomandeQuestionari": 1, "RPR_TestoRisposta": "Buona", "RPR_Ordinamento": 1}),
            json!({"RPR_IdRif_DomandeQuestionari": 1, "RPR_TestoRisposta": "Scarsa", "RPR_Ordinamento": 2}),
        ];
        let merged = attach_proposed_answers(questions, proposed);
        assert_eq!(merged[0]["risposte"].as_array().unwrap().len(), 2);
        assert_eq!(merged[0]["risposte"][1]["RPR_TestoRisposta"], "Scarsa");
        assert_eq!(merged[1]["risposte"], json!([]));
    }

    #[test]
    fn mapping_is_one_based() {
        let mapping = number_questions(vec!["A".to_string(), "B".to_string()]);
        assert_eq!(mapping, vec![json!({"indice": 1, "domanda": "A"}), json!({"indice": 2, "domanda": "B"})]);
    }
}
