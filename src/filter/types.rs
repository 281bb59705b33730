use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq,
    Like,
    Between,
    /// `RQU_IdRif_Questionari IN (questionnaires whose description matches)`
    QuestionnaireDescription,
}

#[derive(Debug, Clone)]
pub struct FilterWhereInfo {
    pub column: String,
    pub operator: FilterOp,
    pub data: Value,
}

/// How a filter object is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// `crudTabella` read filters: `{from, to}` ranges, substring match on strings
    Crud,
    /// Answer listing `filtro`: `{between: [a, b]}` ranges, exact match otherwise
    Listing,
}

#[derive(Debug, Clone, Default)]
pub struct FilterWhereOptions {
    /// Status column restricted to active rows unless the filter names it
    pub status_column: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}
