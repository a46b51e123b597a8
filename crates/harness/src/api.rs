//! REST API surface adapter
//!
//! Bearer-token auth from `POST /auth/login`, tenant scoping via the
//! `X-Tenant-Id` header, bounded per-request timeouts. Request timeouts and
//! refused connections classify as transient so the retry policy can
//! re-attempt them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crossflow_common::types::{Credentials, Project, TenantId};
use crossflow_common::{Error, Result};

use crate::surface::ApiSurface;

const TENANT_HEADER: &str = "X-Tenant-Id";

/// HTTP client for the product's REST API. One instance per session;
/// never shared across concurrent workers.
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
    token: RwLock<Option<String>>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: Option<String>,
}

#[derive(Serialize)]
struct CreateProjectRequest<'a> {
    name: &'a str,
    description: &'a str,
    team_members: &'a [String],
}

/// Wire shape of a project as the API returns it
#[derive(Debug, Deserialize)]
struct ApiProject {
    id: i64,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    team_members: Vec<String>,
}

impl ApiProject {
    fn into_project(self, tenant: &TenantId) -> Project {
        Project {
            id: Some(self.id),
            name: self.name,
            description: self.description,
            collaborators: self.team_members,
            tenant: tenant.clone(),
        }
    }
}

/// Timeouts and refused connections are transient; everything else keeps
/// its reqwest error.
fn classify(e: reqwest::Error) -> Error {
    if e.is_timeout() || e.is_connect() {
        Error::Transient(e.to_string())
    } else {
        Error::Http(e)
    }
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn bearer(&self) -> Result<String> {
        self.token
            .read()
            .await
            .as_ref()
            .map(|t| format!("Bearer {t}"))
            .ok_or_else(|| Error::Auth("not authenticated".into()))
    }
}

#[async_trait]
impl ApiSurface for ApiClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<()> {
        let resp = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginRequest {
                email: &credentials.email,
                password: &credentials.password,
            })
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("login returned {status}: {body}")));
        }

        let body: LoginResponse = resp.json().await.map_err(classify)?;
        let token = body
            .access_token
            .ok_or_else(|| Error::Auth("no access token in login response".into()))?;
        *self.token.write().await = Some(token);
        debug!(email = %credentials.email, "authenticated");
        Ok(())
    }

    async fn create_project(&self, project: &Project, tenant: &TenantId) -> Result<Project> {
        info!(name = %project.name, %tenant, "creating project via API");
        let resp = self
            .client
            .post(self.url("/projects"))
            .header(AUTHORIZATION, self.bearer().await?)
            .header(TENANT_HEADER, tenant.as_str())
            .json(&CreateProjectRequest {
                name: &project.name,
                description: &project.description,
                team_members: &project.collaborators,
            })
            .send()
            .await
            .map_err(classify)?;

        match resp.status().as_u16() {
            200 | 201 => {
                let created: ApiProject = resp.json().await.map_err(classify)?;
                info!(id = created.id, "project created");
                Ok(created.into_project(tenant))
            }
            status => Err(Error::Api {
                status,
                message: resp.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn get_project(&self, id: i64, tenant: &TenantId) -> Result<Project> {
        let resp = self
            .client
            .get(self.url(&format!("/projects/{id}")))
            .header(AUTHORIZATION, self.bearer().await?)
            .header(TENANT_HEADER, tenant.as_str())
            .send()
            .await
            .map_err(classify)?;

        match resp.status().as_u16() {
            200 => {
                let project: ApiProject = resp.json().await.map_err(classify)?;
                Ok(project.into_project(tenant))
            }
            404 => Err(Error::NotFound { kind: "project".into(), id: id.to_string() }),
            401 | 403 => Err(Error::Forbidden { tenant: tenant.clone() }),
            status => Err(Error::Api {
                status,
                message: resp.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn delete_project(&self, id: i64, tenant: &TenantId) -> Result<bool> {
        let resp = self
            .client
            .delete(self.url(&format!("/projects/{id}")))
            .header(AUTHORIZATION, self.bearer().await?)
            .header(TENANT_HEADER, tenant.as_str())
            .send()
            .await
            .map_err(classify)?;

        // 404 means already absent, which is the desired end state
        Ok(matches!(resp.status().as_u16(), 200 | 204 | 404))
    }

    async fn find_project(&self, name: &str, tenant: &TenantId) -> Result<Option<Project>> {
        let resp = self
            .client
            .get(self.url("/projects"))
            .query(&[("name", name)])
            .header(AUTHORIZATION, self.bearer().await?)
            .header(TENANT_HEADER, tenant.as_str())
            .send()
            .await
            .map_err(classify)?;

        match resp.status().as_u16() {
            200 => {
                let projects: Vec<ApiProject> = resp.json().await.map_err(classify)?;
                Ok(projects
                    .into_iter()
                    .find(|p| p.name == name)
                    .map(|p| p.into_project(tenant)))
            }
            404 => Ok(None),
            status => Err(Error::Api {
                status,
                message: resp.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://127.0.0.1:8080/api/v1/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.url("/projects"), "http://127.0.0.1:8080/api/v1/projects");
    }

    #[test]
    fn create_request_uses_team_members_wire_field() {
        let members = vec!["a@x.com".to_string()];
        let req = CreateProjectRequest {
            name: "P1",
            description: "d",
            team_members: &members,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["team_members"][0], "a@x.com");
    }

    #[test]
    fn api_project_tolerates_missing_optional_fields() {
        let p: ApiProject = serde_json::from_str(r#"{"id": 7, "name": "P1"}"#).unwrap();
        let project = p.into_project(&TenantId::from("company1"));
        assert_eq!(project.id, Some(7));
        assert!(project.collaborators.is_empty());
    }
}
