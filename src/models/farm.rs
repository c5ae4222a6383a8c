//! Farm models

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::{non_negative, Contract};

/// Farm row from `farms`, used for listings
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FarmSummary {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub available_trees: i32,
    pub description: Option<String>,
}

/// Farm with its contracts embedded
#[derive(Debug, Clone, Serialize)]
pub struct Farm {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub available_trees: u32,
    pub description: Option<String>,
    pub contracts: Vec<Contract>,
}

impl Farm {
    pub fn from_summary(summary: FarmSummary, contracts: Vec<Contract>) -> Self {
        Self {
            id: summary.id,
            name: summary.name,
            location: summary.location,
            available_trees: non_negative(summary.available_trees),
            description: summary.description,
            contracts,
        }
    }

    /// Find an embedded contract by id
    pub fn contract(&self, contract_id: Uuid) -> Option<&Contract> {
        self.contracts.iter().find(|c| c.id == contract_id)
    }
}
