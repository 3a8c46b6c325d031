//! Role and department access tables
//!
//! Access control at the retrieval layer is enforced by searching only
//! the vector collections a role maps to; there is no global collection
//! spanning departments. This module owns the role -> departments table
//! and the department -> collection-name mapping.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fallback collection for unknown departments
const DEFAULT_COLLECTION: &str = "general";

/// Permissions attached to a role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePermissions {
    /// Departments this role may search
    pub departments: Vec<String>,

    /// Human-readable description of the role's scope
    pub description: String,
}

/// Role -> departments table plus the department -> collection mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleTable {
    roles: HashMap<String, RolePermissions>,
    collections: HashMap<String, String>,
}

impl RoleTable {
    /// Build an empty table (roles added via [`RoleTable::with_role`])
    pub fn new() -> Self {
        Self {
            roles: HashMap::new(),
            collections: HashMap::new(),
        }
    }

    /// The standard company table: each department role sees its own
    /// collection, C-Level sees everything, Employee sees General.
    pub fn company_default() -> Self {
        let mut table = Self::new();

        table.add_role(
            "Finance",
            &["Finance"],
            "Access to financial reports, expenses, and budgets",
        );
        table.add_role(
            "Marketing",
            &["Marketing"],
            "Access to campaign data, customer feedback, and sales metrics",
        );
        table.add_role(
            "HR",
            &["HR"],
            "Access to employee data, attendance, payroll, and performance",
        );
        table.add_role(
            "Engineering",
            &["Engineering"],
            "Access to technical architecture and development processes",
        );
        table.add_role(
            "C-Level",
            &["Finance", "Marketing", "HR", "Engineering", "General"],
            "Full access to all company data",
        );
        table.add_role(
            "Employee",
            &["General"],
            "Access to general company policies, events, and FAQs",
        );

        table.map_collection("Finance", "finance");
        table.map_collection("Marketing", "marketing");
        table.map_collection("HR", "hr_dept");
        table.map_collection("Engineering", "engineering");
        table.map_collection("General", "general");

        table
    }

    /// Register a role with its accessible departments
    pub fn add_role(&mut self, role: &str, departments: &[&str], description: &str) {
        self.roles.insert(
            role.to_string(),
            RolePermissions {
                departments: departments.iter().map(|d| d.to_string()).collect(),
                description: description.to_string(),
            },
        );
    }

    /// Register a department -> collection-name mapping
    pub fn map_collection(&mut self, department: &str, collection: &str) {
        self.collections
            .insert(department.to_string(), collection.to_string());
    }

    /// Departments accessible to a role; unknown roles see nothing
    pub fn departments_for(&self, role: &str) -> Vec<String> {
        self.roles
            .get(role)
            .map(|p| p.departments.clone())
            .unwrap_or_default()
    }

    /// Description of a role's scope, if the role exists
    pub fn description_for(&self, role: &str) -> Option<&str> {
        self.roles.get(role).map(|p| p.description.as_str())
    }

    /// Collection name backing a department
    pub fn collection_for(&self, department: &str) -> String {
        self.collections
            .get(department)
            .cloned()
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string())
    }

    /// Whether the role may access the department
    pub fn can_access(&self, role: &str, department: &str) -> bool {
        self.roles
            .get(role)
            .map(|p| p.departments.iter().any(|d| d == department))
            .unwrap_or(false)
    }

    /// All known role names
    pub fn valid_roles(&self) -> Vec<String> {
        let mut roles: Vec<String> = self.roles.keys().cloned().collect();
        roles.sort();
        roles
    }

    /// All departments that have a collection mapping
    pub fn all_departments(&self) -> Vec<String> {
        let mut departments: Vec<String> = self.collections.keys().cloned().collect();
        departments.sort();
        departments
    }
}

impl Default for RoleTable {
    fn default() -> Self {
        Self::company_default()
    }
}
