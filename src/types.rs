/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Write operations accepted in a `changes` array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Operation::Create),
            "update" => Some(Operation::Update),
            "delete" => Some(Operation::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Value of a `<Prefix>StatoRecord` column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    /// Current row
    Active,
    /// Soft-deleted
    Cancelled,
    /// Superseded by a newer version of the same record
    Disabled,
}

impl RecordStatus {
    pub fn code(&self) -> &'static str {
        match self {
            RecordStatus::Active => "A",
            RecordStatus::Cancelled => "C",
            RecordStatus::Disabled => "D",
        }
    }
}

/// Operation classes a permission row grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionKind {
    Access,
    Insert,
    Modify,
    Advanced,
}

impl PermissionKind {
    pub const ALL: [PermissionKind; 4] = [
        PermissionKind::Access,
        PermissionKind::Insert,
        PermissionKind::Modify,
        PermissionKind::Advanced,
    ];

    /// Column of ANS_AbilitazioniOperazioni holding the flag
    pub fn column(&self) -> &'static str {
        match self {
            PermissionKind::Access => "ABO_Accesso",
            PermissionKind::Insert => "ABO_Inserimento",
            PermissionKind::Modify => "ABO_Modifica",
            PermissionKind::Advanced => "ABO_GestioneAvanzata",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionKind::Access => "access",
            PermissionKind::Insert => "insert",
            PermissionKind::Modify => "modify",
            PermissionKind::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
