// [libs/infra/db-turso/src/repositories/tenancy.rs]
//! =================================================================
//! APARATO: TENANCY REPOSITORY (V3.1)
//! CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
//! RESPONSABILIDAD: RESOLUCIÓN DEL CAMINO deal -> organization
//! =================================================================

use crate::errors::DbError;
use crate::TursoClient;
use acumen_domain_models::{Deal, Organization};
use chrono::Utc;
use libsql::params;
use uuid::Uuid;

pub struct TenancyRepository {
    database_client: TursoClient,
}

impl TenancyRepository {
    pub fn new(client: TursoClient) -> Self {
        Self { database_client: client }
    }

    pub async fn create_organization(&self, name: &str) -> Result<String, DbError> {
        let organization_id = Uuid::new_v4().to_string();
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO organizations (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![organization_id.clone(), name, Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(organization_id)
    }

    pub async fn create_deal(&self, organization_id: &str, name: &str) -> Result<String, DbError> {
        let deal_id = Uuid::new_v4().to_string();
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO deals (id, organization_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![deal_id.clone(), organization_id, name, Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(deal_id)
    }

    pub async fn get_deal(&self, deal_id: &str) -> Result<Option<Deal>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT id, organization_id, name, created_at FROM deals WHERE id = ?1",
                params![deal_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Deal {
                id: row.get(0)?,
                organization_id: row.get(1)?,
                name: row.get(2)?,
                created_at: row.get(3)?,
            })),
            None => Ok(None),
        }
    }

    pub async fn get_organization(
        &self,
        organization_id: &str,
    ) -> Result<Option<Organization>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT id, name, created_at FROM organizations WHERE id = ?1",
                params![organization_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Organization {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
            })),
            None => Ok(None),
        }
    }

    /// Resuelve la organización propietaria de un deal. Todo artefacto
    /// derivado debe poder resolver este camino; su ausencia es un bug.
    pub async fn get_organization_id_for_deal(&self, deal_id: &str) -> Result<String, DbError> {
        self.get_deal(deal_id)
            .await?
            .map(|deal| deal.organization_id)
            .ok_or_else(|| DbError::NotFound(format!("deal {}", deal_id)))
    }
}
