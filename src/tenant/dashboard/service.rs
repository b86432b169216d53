/*
 * This file is part of the Alfred Dashboard Gateway.
 *
 * Copyright (C) 2025 Kovács Dávid <kapcsolat@kovacsdavid.dev>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use crate::common::error::{FriendlyError, IntoFriendlyError, RepositoryError};
use crate::manager::auth::dto::Claims;
use crate::manager::directory::model::TenantCoordinates;
use crate::tenant::dashboard::DashboardModule;
use crate::tenant::dashboard::dto::{
    FetchUserDataRequest, FetchUserDataResponse, GraphResponse, ManageGraphRequest,
    ManageResponse, ManageTableRequest, QueryDebug, QueryRequest, TableResponse,
};
use crate::tenant::dashboard::model::{ColumnConfig, ParamSchemaEntry, TableMetadata};
use crate::tenant::dashboard::params::resolve_params;
use crate::tenant::dashboard::repository::DashboardRepository;
use crate::tenant::dashboard::template::compile;
use crate::tenant::dashboard::value::ParamValue;
use axum::http::StatusCode;
use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::Level;
use uuid::Uuid;

const CLIENTES_SLUG: &str = "clientes";
const DEBUG_SAMPLE_ROWS: usize = 3;

const EMPTY_TEMPLATE_ERROR: &str = "Query template vazio.";
const CHART_NOT_FOUND_ERROR: &str = "Gráfico não encontrado ou inativo.";
const TABLE_NOT_FOUND_ERROR: &str = "Tabela não encontrada ou inativa.";

/// Role set seed used by the batch path. The administrative gate seeds with
/// `authenticated` only; this asymmetry is load-bearing for metadata rows
/// restricted to `allowed_roles = ['user']`.
const BATCH_ROLE_SEED: [&str; 2] = ["user", "authenticated"];

#[derive(Debug, Error)]
pub enum DashboardServiceError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Empresa não configurada para este usuário.")]
    TenantNotFound,

    #[error("Slug e query template são obrigatórios.")]
    InvalidMetadata,

    #[error("Slug já cadastrado.")]
    DuplicateSlug,

    #[error("Registro não encontrado.")]
    MetadataNotFound,
}

impl IntoFriendlyError for DashboardServiceError {
    fn into_friendly_error(self) -> FriendlyError {
        match self {
            Self::TenantNotFound | Self::MetadataNotFound => FriendlyError::user_facing(
                Level::DEBUG,
                StatusCode::NOT_FOUND,
                file!(),
                &self.to_string(),
            ),
            Self::InvalidMetadata => FriendlyError::user_facing(
                Level::DEBUG,
                StatusCode::BAD_REQUEST,
                file!(),
                &self.to_string(),
            ),
            Self::DuplicateSlug => FriendlyError::user_facing(
                Level::DEBUG,
                StatusCode::CONFLICT,
                file!(),
                &self.to_string(),
            ),
            e => FriendlyError::internal(file!(), e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MetadataKind {
    Chart,
    Table,
}

impl MetadataKind {
    fn permission_denied_message(self) -> &'static str {
        match self {
            MetadataKind::Chart => "Usuário não possui permissão para acessar este gráfico.",
            MetadataKind::Table => "Usuário não possui permissão para acessar esta tabela.",
        }
    }
}

/// The common projection of a chart or table row the executor works on.
struct MetadataQuery<'a> {
    slug: &'a str,
    kind: MetadataKind,
    query_template: &'a str,
    param_schema: Option<&'a Value>,
    default_params: Option<&'a Value>,
    allowed_roles: &'a [String],
}

pub struct DashboardService;

type DashboardServiceResult<T> = Result<T, DashboardServiceError>;

impl DashboardService {
    /// Runs one batch of chart and table queries against the caller's
    /// tenant database and assembles the combined response document.
    ///
    /// Per-slug failures (blank template, role gate, validation, template
    /// compilation, execution) are downgraded into the `errors` /
    /// `tableErrors` maps and never abort the batch. Infrastructure
    /// failures (tenant lookup, metadata fetch) abort the whole request.
    pub async fn fetch_user_data(
        claims: &Claims,
        payload: FetchUserDataRequest,
        module: Arc<dyn DashboardModule>,
    ) -> DashboardServiceResult<FetchUserDataResponse> {
        let coords = Self::tenant_coords(claims.sub(), &module).await?;
        let repo = module.dashboard_repo();
        let roles = claims.roles_seeded(BATCH_ROLE_SEED);
        let today = Utc::now().date_naive();

        let mut response = FetchUserDataResponse {
            company_name: coords.company_name.clone(),
            ..Default::default()
        };

        let (graph_slugs, graph_params) = Self::index_requests(payload.graphs);
        let charts = repo.fetch_charts(&coords, &graph_slugs).await?;
        let mut known_charts: HashSet<&str> = HashSet::new();
        for chart in &charts {
            known_charts.insert(chart.slug.as_str());
            let query = MetadataQuery {
                slug: &chart.slug,
                kind: MetadataKind::Chart,
                query_template: &chart.query_template,
                param_schema: chart.param_schema.as_ref(),
                default_params: chart.default_params.as_ref(),
                allowed_roles: &chart.allowed_roles,
            };
            let provided = graph_params.get(&chart.slug).and_then(Option::as_ref);
            match Self::execute(query, provided, &roles, &coords, &repo, today).await {
                Ok((rows, debug)) => {
                    response.graphics.push(GraphResponse::from(chart));
                    response.datasets.insert(chart.id.to_string(), rows);
                    response.debug.insert(chart.id.to_string(), debug);
                }
                Err(message) => {
                    response.errors.insert(chart.slug.clone(), message);
                }
            }
        }
        for slug in &graph_slugs {
            if !known_charts.contains(slug.as_str()) {
                response
                    .errors
                    .insert(slug.clone(), CHART_NOT_FOUND_ERROR.to_string());
            }
        }

        let (table_slugs, table_params) = Self::index_requests(payload.tables);
        let mut tables = repo.fetch_tables(&coords, &table_slugs).await?;
        let wants_clientes =
            table_slugs.is_empty() || table_slugs.iter().any(|slug| slug == CLIENTES_SLUG);
        if wants_clientes
            && !tables.iter().any(|table| table.slug == CLIENTES_SLUG)
            && let Some(recency_column) = repo.clientes_recency_column(&coords).await?
        {
            // Synthesized baseline row; id 0 keeps it ahead of real rows.
            tables.insert(0, Self::baseline_clientes_table(&recency_column));
        }

        let mut known_tables: HashSet<String> = HashSet::new();
        for table in &tables {
            known_tables.insert(table.slug.clone());
            let query = MetadataQuery {
                slug: &table.slug,
                kind: MetadataKind::Table,
                query_template: &table.query_template,
                param_schema: table.param_schema.as_ref(),
                default_params: table.default_params.as_ref(),
                allowed_roles: &table.allowed_roles,
            };
            let provided = table_params.get(&table.slug).and_then(Option::as_ref);
            match Self::execute(query, provided, &roles, &coords, &repo, today).await {
                Ok((rows, debug)) => {
                    response.tables.push(TableResponse::from(table));
                    response.table_rows.insert(table.id.to_string(), rows);
                    response.table_debug.insert(table.id.to_string(), debug);
                }
                Err(message) => {
                    response.table_errors.insert(table.slug.clone(), message);
                }
            }
        }
        for slug in &table_slugs {
            if !known_tables.contains(slug) {
                response
                    .table_errors
                    .insert(slug.clone(), TABLE_NOT_FOUND_ERROR.to_string());
            }
        }

        Ok(response)
    }

    pub async fn manage_graph(
        claims: &Claims,
        payload: ManageGraphRequest,
        module: Arc<dyn DashboardModule>,
    ) -> DashboardServiceResult<ManageResponse> {
        if payload.slug.trim().is_empty() || payload.query_template.trim().is_empty() {
            return Err(DashboardServiceError::InvalidMetadata);
        }
        let coords = Self::tenant_coords(claims.sub(), &module).await?;
        let (id, slug) = module
            .dashboard_repo()
            .upsert_chart(&coords, &payload)
            .await
            .map_err(Self::manage_error)?;
        Ok(ManageResponse {
            message: String::from("Gráfico salvo com sucesso."),
            id,
            slug,
            company_name: coords.company_name,
        })
    }

    pub async fn manage_table(
        claims: &Claims,
        payload: ManageTableRequest,
        module: Arc<dyn DashboardModule>,
    ) -> DashboardServiceResult<ManageResponse> {
        if payload.slug.trim().is_empty() || payload.query_template.trim().is_empty() {
            return Err(DashboardServiceError::InvalidMetadata);
        }
        let coords = Self::tenant_coords(claims.sub(), &module).await?;
        let (id, slug) = module
            .dashboard_repo()
            .upsert_table(&coords, &payload)
            .await
            .map_err(Self::manage_error)?;
        Ok(ManageResponse {
            message: String::from("Tabela salva com sucesso."),
            id,
            slug,
            company_name: coords.company_name,
        })
    }

    async fn tenant_coords(
        user_id: Uuid,
        module: &Arc<dyn DashboardModule>,
    ) -> DashboardServiceResult<TenantCoordinates> {
        module
            .directory_repo()
            .get_by_user_id(user_id)
            .await?
            .ok_or(DashboardServiceError::TenantNotFound)
    }

    fn manage_error(error: RepositoryError) -> DashboardServiceError {
        if error.is_unique_violation() {
            DashboardServiceError::DuplicateSlug
        } else if error.is_row_not_found() {
            DashboardServiceError::MetadataNotFound
        } else {
            error.into()
        }
    }

    #[allow(clippy::type_complexity)]
    fn index_requests(
        requests: Option<Vec<QueryRequest>>,
    ) -> (Vec<String>, HashMap<String, Option<Map<String, Value>>>) {
        let requests = requests.unwrap_or_default();
        let slugs = requests.iter().map(|r| r.slug.clone()).collect();
        let params = requests
            .into_iter()
            .map(|r| (r.slug, r.params))
            .collect();
        (slugs, params)
    }

    /// Runs one metadata row end to end; any failure comes back as the
    /// per-slug error string recorded in the response document.
    async fn execute(
        query: MetadataQuery<'_>,
        provided: Option<&Map<String, Value>>,
        roles: &HashSet<String>,
        coords: &TenantCoordinates,
        repo: &Arc<dyn DashboardRepository>,
        today: NaiveDate,
    ) -> Result<(Vec<Map<String, Value>>, QueryDebug), String> {
        if query.query_template.trim().is_empty() {
            return Err(EMPTY_TEMPLATE_ERROR.to_string());
        }
        if !query.allowed_roles.is_empty()
            && !query.allowed_roles.iter().any(|role| roles.contains(role))
        {
            return Err(query.kind.permission_denied_message().to_string());
        }

        let schema = Self::parse_schema(query.param_schema)?;
        let defaults = query.default_params.and_then(Value::as_object);
        let params =
            resolve_params(&schema, defaults, provided, today).map_err(|e| e.to_string())?;
        let compiled = compile(query.query_template, &params).map_err(|e| e.to_string())?;

        let rows = repo
            .run_query(coords, &compiled.text, &compiled.args)
            .await
            .map_err(|e| e.to_string())?;

        let debug = QueryDebug {
            slug: query.slug.to_string(),
            params: Value::Object(
                params
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
            query: compiled.text,
            args: compiled.args.iter().map(ParamValue::to_json).collect(),
            row_count: rows.len(),
            sample: rows
                .iter()
                .take(DEBUG_SAMPLE_ROWS)
                .cloned()
                .map(Value::Object)
                .collect(),
        };

        Ok((rows, debug))
    }

    fn parse_schema(
        value: Option<&Value>,
    ) -> Result<BTreeMap<String, ParamSchemaEntry>, String> {
        match value {
            None | Some(Value::Null) => Ok(BTreeMap::new()),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| format!("Esquema de parâmetros inválido: {e}")),
        }
    }

    /// The baseline customer listing available to every tenant that has a
    /// `clientes` table, ordered by the probed recency column.
    fn baseline_clientes_table(recency_column: &str) -> TableMetadata {
        let mut columns = vec![
            ColumnConfig::new("id", "ID", "number"),
            ColumnConfig::new("nome", "Nome", "string"),
            ColumnConfig::new("nome_recebido", "Nome recebido", "string"),
            ColumnConfig::new("whatsapp", "WhatsApp", "string"),
            ColumnConfig::new("paused", "Pausado", "boolean").toggle(),
            ColumnConfig::new("created_at", "Cadastro", "date"),
        ];
        let query_template = if recency_column == "ultimo_acesso" {
            columns.push(ColumnConfig::new("ultimo_acesso", "Último acesso", "date"));
            "SELECT id, uuid, nome, nome_recebido, whatsapp, paused, created_at, ultimo_acesso
                 FROM clientes
                 ORDER BY ultimo_acesso DESC NULLS LAST
                 LIMIT 500"
        } else {
            "SELECT id, uuid, nome, nome_recebido, whatsapp, paused, created_at
                 FROM clientes
                 ORDER BY created_at DESC
                 LIMIT 500"
        };
        TableMetadata {
            id: 0,
            slug: CLIENTES_SLUG.to_string(),
            title: Some(String::from("Clientes")),
            description: Some(String::from("Clientes cadastrados e atividade recente")),
            query_template: query_template.to_string(),
            column_config: serde_json::to_value(&columns).ok(),
            param_schema: None,
            default_params: None,
            result_shape: None,
            allowed_roles: vec![],
            primary_key: Some(String::from("id")),
            is_active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::directory::repository::MockDirectoryRepository;
    use crate::tenant::dashboard::model::ChartMetadata;
    use crate::tenant::dashboard::repository::MockDashboardRepository;
    use crate::tenant::dashboard::tests::MockDashboardModule;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn claims_with(app_metadata: Value) -> Claims {
        Claims::new(
            Uuid::new_v4(),
            2_000_000_000,
            1_700_000_000,
            "http://localhost:9999/auth/v1".to_string(),
            "authenticated".to_string(),
            Some("maria@empresa.example".to_string()),
            app_metadata,
            Value::Null,
        )
    }

    fn coords(user_id: Uuid) -> TenantCoordinates {
        TenantCoordinates {
            id_user: user_id,
            db_host: "db.empresa.example".to_string(),
            db_name: "empresa".to_string(),
            db_user: "alfred_reader".to_string(),
            db_password: "s3cr3t".to_string(),
            company_name: "Empresa Exemplo".to_string(),
        }
    }

    fn chart(
        id: i64,
        slug: &str,
        template: &str,
        param_schema: Option<Value>,
        allowed_roles: Vec<&str>,
    ) -> ChartMetadata {
        ChartMetadata {
            id,
            slug: slug.to_string(),
            title: Some(slug.to_string()),
            description: None,
            query_template: template.to_string(),
            param_schema,
            default_params: None,
            result_shape: None,
            allowed_roles: allowed_roles.into_iter().map(str::to_string).collect(),
            is_active: true,
        }
    }

    fn sample_row() -> Map<String, Value> {
        let mut row = Map::new();
        row.insert("total".to_string(), json!(10));
        row
    }

    fn module_with(
        user_id: Uuid,
        mut repo: MockDashboardRepository,
        needs_tables: bool,
    ) -> Arc<dyn DashboardModule> {
        if needs_tables {
            repo.expect_fetch_tables().returning(|_, _| Ok(vec![]));
            repo.expect_clientes_recency_column()
                .returning(|_| Ok(None));
        }
        let repo: Arc<dyn DashboardRepository> = Arc::new(repo);
        let mut directory = MockDirectoryRepository::new();
        directory
            .expect_get_by_user_id()
            .returning(move |_| Ok(Some(coords(user_id))));
        let directory: Arc<dyn DirectoryRepository> = Arc::new(directory);

        let mut module = MockDashboardModule::new();
        module
            .expect_dashboard_repo()
            .returning(move || repo.clone());
        module
            .expect_directory_repo()
            .returning(move || directory.clone());
        Arc::new(module)
    }

    use crate::manager::directory::repository::DirectoryRepository;

    #[tokio::test]
    async fn required_param_failure_stays_slug_local() {
        let claims = claims_with(Value::Null);
        let user_id = claims.sub();

        let mut repo = MockDashboardRepository::new();
        repo.expect_fetch_charts().returning(|_, _| {
            Ok(vec![
                chart(
                    1,
                    "vendas",
                    "SELECT * FROM vendas WHERE empresa = {{company}}",
                    Some(json!({"company": {"type": "string", "required": true}})),
                    vec![],
                ),
                chart(2, "acessos", "SELECT COUNT(*) AS total FROM acessos", None, vec![]),
            ])
        });
        repo.expect_run_query()
            .times(1)
            .returning(|_, _, _| Ok(vec![sample_row()]));

        let payload = FetchUserDataRequest {
            graphs: Some(vec![
                QueryRequest {
                    slug: "vendas".to_string(),
                    params: None,
                },
                QueryRequest {
                    slug: "acessos".to_string(),
                    params: None,
                },
            ]),
            tables: None,
        };

        let response =
            DashboardService::fetch_user_data(&claims, payload, module_with(user_id, repo, true))
                .await
                .unwrap();

        assert_eq!(
            response.errors["vendas"],
            "Parâmetro obrigatório ausente: company"
        );
        assert!(response.datasets.contains_key("2"));
        assert!(!response.datasets.contains_key("1"));
        assert!(!response.errors.contains_key("acessos"));
        assert_eq!(response.graphics.len(), 1);
        assert_eq!(response.company_name, "Empresa Exemplo");
    }

    #[tokio::test]
    async fn role_gated_chart_never_reaches_execution() {
        let claims = claims_with(Value::Null);
        let user_id = claims.sub();

        let mut repo = MockDashboardRepository::new();
        repo.expect_fetch_charts().returning(|_, _| {
            Ok(vec![chart(
                1,
                "financeiro",
                "SELECT * FROM faturamento",
                None,
                vec!["admin"],
            )])
        });
        repo.expect_run_query().never();

        let response = DashboardService::fetch_user_data(
            &claims,
            FetchUserDataRequest::default(),
            module_with(user_id, repo, true),
        )
        .await
        .unwrap();

        assert_eq!(
            response.errors["financeiro"],
            "Usuário não possui permissão para acessar este gráfico."
        );
        assert!(response.debug.is_empty());
    }

    #[tokio::test]
    async fn batch_role_seed_covers_the_user_role() {
        // A principal with no role metadata still passes a
        // `allowed_roles = ['user']` gate on the batch path.
        let claims = claims_with(Value::Null);
        let user_id = claims.sub();

        let mut repo = MockDashboardRepository::new();
        repo.expect_fetch_charts().returning(|_, _| {
            Ok(vec![chart(
                1,
                "vendas",
                "SELECT COUNT(*) AS total FROM vendas",
                None,
                vec!["user"],
            )])
        });
        repo.expect_run_query()
            .times(1)
            .returning(|_, _, _| Ok(vec![sample_row()]));

        let response = DashboardService::fetch_user_data(
            &claims,
            FetchUserDataRequest::default(),
            module_with(user_id, repo, true),
        )
        .await
        .unwrap();

        assert!(response.errors.is_empty());
        assert!(response.datasets.contains_key("1"));
    }

    #[tokio::test]
    async fn blank_template_and_unknown_slug_report_per_slug_errors() {
        let claims = claims_with(Value::Null);
        let user_id = claims.sub();

        let mut repo = MockDashboardRepository::new();
        repo.expect_fetch_charts()
            .returning(|_, _| Ok(vec![chart(1, "vazio", "   ", None, vec![])]));
        repo.expect_run_query().never();

        let payload = FetchUserDataRequest {
            graphs: Some(vec![
                QueryRequest {
                    slug: "vazio".to_string(),
                    params: None,
                },
                QueryRequest {
                    slug: "inexistente".to_string(),
                    params: None,
                },
            ]),
            tables: None,
        };

        let response =
            DashboardService::fetch_user_data(&claims, payload, module_with(user_id, repo, true))
                .await
                .unwrap();

        assert_eq!(response.errors["vazio"], "Query template vazio.");
        assert_eq!(
            response.errors["inexistente"],
            "Gráfico não encontrado ou inativo."
        );
        assert!(response.datasets.is_empty());
    }

    #[tokio::test]
    async fn array_parameters_are_rewritten_before_execution() {
        let claims = claims_with(Value::Null);
        let user_id = claims.sub();

        let mut repo = MockDashboardRepository::new();
        repo.expect_fetch_charts().returning(|_, _| {
            Ok(vec![chart(
                1,
                "reservas",
                "SELECT * FROM r WHERE status IN ({{statuses}})",
                Some(json!({
                    "statuses": {"type": "array", "items": {"type": "string"}}
                })),
                vec![],
            )])
        });
        repo.expect_run_query()
            .withf(|_, sql, args| {
                sql == "SELECT * FROM r WHERE status = ANY($1)"
                    && *args
                        == [ParamValue::TextArray(vec![
                            "a".to_string(),
                            "b".to_string(),
                        ])]
            })
            .times(1)
            .returning(|_, _, _| Ok(vec![]));

        let payload = FetchUserDataRequest {
            graphs: Some(vec![QueryRequest {
                slug: "reservas".to_string(),
                params: json!({"statuses": ["a", "b"]}).as_object().cloned(),
            }]),
            tables: None,
        };

        let response =
            DashboardService::fetch_user_data(&claims, payload, module_with(user_id, repo, true))
                .await
                .unwrap();

        assert!(response.errors.is_empty());
        assert_eq!(response.debug["1"].query, "SELECT * FROM r WHERE status = ANY($1)");
        assert_eq!(response.debug["1"].args, vec![json!(["a", "b"])]);
    }

    #[tokio::test]
    async fn baseline_clientes_table_is_synthesized_when_probed() {
        let claims = claims_with(Value::Null);
        let user_id = claims.sub();

        let mut repo = MockDashboardRepository::new();
        repo.expect_fetch_charts().returning(|_, _| Ok(vec![]));
        repo.expect_fetch_tables().returning(|_, _| Ok(vec![]));
        repo.expect_clientes_recency_column()
            .returning(|_| Ok(Some("ultimo_acesso".to_string())));
        repo.expect_run_query()
            .withf(|_, sql, _| sql.contains("ultimo_acesso") && sql.contains("FROM clientes"))
            .times(1)
            .returning(|_, _, _| Ok(vec![sample_row()]));

        let response = DashboardService::fetch_user_data(
            &claims,
            FetchUserDataRequest::default(),
            module_with(user_id, repo, false),
        )
        .await
        .unwrap();

        assert_eq!(response.tables.len(), 1);
        assert_eq!(response.tables[0].slug, "clientes");
        assert_eq!(response.tables[0].primary_key.as_deref(), Some("id"));
        assert!(response.table_rows.contains_key("0"));
        assert!(response.table_errors.is_empty());
    }

    #[tokio::test]
    async fn missing_clientes_table_is_silently_skipped() {
        let claims = claims_with(Value::Null);
        let user_id = claims.sub();

        let mut repo = MockDashboardRepository::new();
        repo.expect_fetch_charts().returning(|_, _| Ok(vec![]));
        repo.expect_fetch_tables().returning(|_, _| Ok(vec![]));
        repo.expect_clientes_recency_column()
            .returning(|_| Ok(None));
        repo.expect_run_query().never();

        let response = DashboardService::fetch_user_data(
            &claims,
            FetchUserDataRequest::default(),
            module_with(user_id, repo, false),
        )
        .await
        .unwrap();

        assert!(response.tables.is_empty());
        assert!(response.table_rows.is_empty());
    }

    #[tokio::test]
    async fn missing_tenant_aborts_the_whole_request() {
        let claims = claims_with(Value::Null);

        let mut directory = MockDirectoryRepository::new();
        directory.expect_get_by_user_id().returning(|_| Ok(None));
        let directory: Arc<dyn DirectoryRepository> = Arc::new(directory);
        let repo: Arc<dyn DashboardRepository> = Arc::new(MockDashboardRepository::new());

        let mut module = MockDashboardModule::new();
        module
            .expect_dashboard_repo()
            .returning(move || repo.clone());
        module
            .expect_directory_repo()
            .returning(move || directory.clone());

        let result = DashboardService::fetch_user_data(
            &claims,
            FetchUserDataRequest::default(),
            Arc::new(module),
        )
        .await;

        assert!(matches!(result, Err(DashboardServiceError::TenantNotFound)));
    }

    #[tokio::test]
    async fn manage_graph_maps_conflicts_and_validates_input() {
        let claims = claims_with(json!({"role": "admin"}));
        let user_id = claims.sub();

        let mut empty_slug = ManageGraphRequest {
            id: None,
            slug: String::new(),
            title: None,
            description: None,
            query_template: "SELECT 1".to_string(),
            param_schema: None,
            default_params: None,
            result_shape: None,
            allowed_roles: None,
            is_active: None,
        };
        let module = module_with(user_id, MockDashboardRepository::new(), false);
        assert!(matches!(
            DashboardService::manage_graph(&claims, empty_slug.clone(), module).await,
            Err(DashboardServiceError::InvalidMetadata)
        ));

        empty_slug.slug = "novo_grafico".to_string();
        let mut repo = MockDashboardRepository::new();
        repo.expect_upsert_chart()
            .returning(|_, _| Ok((7, "novo_grafico".to_string())));
        let response = DashboardService::manage_graph(
            &claims,
            empty_slug,
            module_with(user_id, repo, false),
        )
        .await
        .unwrap();
        assert_eq!(response.id, 7);
        assert_eq!(response.slug, "novo_grafico");
        assert_eq!(response.company_name, "Empresa Exemplo");
    }
}
