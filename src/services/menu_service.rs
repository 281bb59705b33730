use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;
use sqlx::{MySqlPool, Row};

use crate::database::values::{as_i64, rows_to_json};
use crate::database::DatabaseError;

/// Node of the navigation tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuNode {
    pub id: i64,
    pub children: Vec<MenuNode>,
}

/// `ANS_AlberoFunzioni` edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeEdge {
    pub parent: i64,
    pub child: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Menu {
    pub tree: Vec<MenuNode>,
    pub functions: Vec<Value>,
}

/// Arrange the allowed functions into a forest.
///
/// Edges to a non-allowed child are ignored. A child whose parent is not
/// allowed is hidden together with its subtree. Roots are the allowed
/// functions never seen as a child, in `allowed` order.
pub fn build_tree(edges: &[TreeEdge], allowed: &[i64]) -> Vec<MenuNode> {
    let allowed_set: HashSet<i64> = allowed.iter().copied().collect();
    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut seen_as_child: HashSet<i64> = HashSet::new();

    for edge in edges {
        if !allowed_set.contains(&edge.child) {
            continue;
        }
        seen_as_child.insert(edge.child);
        if allowed_set.contains(&edge.parent) {
            children.entry(edge.parent).or_default().push(edge.child);
        }
    }

    let mut emitted = HashSet::new();
    let mut path = Vec::new();
    allowed
        .iter()
        .filter(|id| !seen_as_child.contains(id) && emitted.insert(**id))
        .map(|id| materialize(*id, &children, &mut path))
        .collect()
}

fn materialize(id: i64, children: &HashMap<i64, Vec<i64>>, path: &mut Vec<i64>) -> MenuNode {
    path.push(id);
    let nodes = children
        .get(&id)
        .map(|kids| {
            kids.iter()
                // a cycle in the tree table would recurse forever
                .filter(|kid| !path.contains(kid))
                .copied()
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
        .into_iter()
        .map(|kid| materialize(kid, children, path))
        .collect();
    path.pop();
    MenuNode { id, children: nodes }
}

pub struct MenuService {
    pool: MySqlPool,
}

impl MenuService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Functions `group_id` may access and their tree; group 0 sees every grant
    pub async fn menu(&self, group_id: i64) -> Result<Menu, DatabaseError> {
        let rows = sqlx::query(
            "SELECT ao.ABO_Id_Funzioni AS functionId, ao.ABO_Accesso, efu.EFU_CodiceFunzione, efu.EFU_NomeFunzione, \
                    efu.EFU_Componente, efu.EFU_RottaFrontend, efu.EFU_RottaBackend, efu.EFU_ModuloApplicativo, efu.EFU_NomeTabella \
             FROM ANS_AbilitazioniOperazioni ao \
             JOIN ANS_Funzioni efu ON ao.ABO_Id_Funzioni = efu.EFU_Id_Funzioni \
             WHERE (? = 0 OR ao.ABO_Id_GruppiAbilitazioni = ? OR ao.ABO_Id_GruppiAbilitazioni = 0) \
               AND ao.ABO_Accesso = 1",
        )
        .bind(group_id)
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        let functions = rows_to_json(&rows);
        let allowed: Vec<i64> = functions
            .iter()
            .filter_map(|f| f.get("functionId").and_then(as_i64))
            .collect();

        let edge_rows = sqlx::query(
            "SELECT CAST(AFU_Id_Padre AS SIGNED) AS parent, CAST(AFU_Id_Figlio AS SIGNED) AS child \
             FROM ANS_AlberoFunzioni \
             WHERE AFU_Id_GruppiAbilitazioni = ? \
             ORDER BY AFU_Posizionamento",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        let edges: Vec<TreeEdge> = edge_rows
            .iter()
            .filter_map(|r| {
                Some(TreeEdge {
                    parent: r.try_get::<Option<i64>, _>("parent").ok().flatten()?,
                    child: r.try_get::<Option<i64>, _>("child").ok().flatten()?,
                })
            })
            .collect();

        tracing::debug!("Menu of group {}: {} functions, {} edges", group_id, allowed.len(), edges.len());
        Ok(Menu { tree: build_tree(&edges, &allowed), functions })
    }
}
