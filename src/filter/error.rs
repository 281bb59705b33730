use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Colonna non valida: {0}")]
    InvalidColumn(String),

    #[error("Filtro non valido per {field}: {reason}")]
    InvalidCondition { field: String, reason: String },

    #[error("Formato filtri non valido")]
    InvalidFormat,
}
