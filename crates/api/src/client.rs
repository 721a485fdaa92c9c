use std::collections::HashMap;

use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use rackview_core::{ArticleClass, ArticleLocationRecord, InventoryStatus, StockStatus};

/// Client for the warehouse location endpoints.
#[derive(Clone)]
pub struct WarehouseClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl WarehouseClient {
    /// Creates a new client. `base_url` must end with `/` for relative paths to resolve.
    pub fn new(base_url: Url, token: Option<String>, http: Client) -> Self {
        Self {
            http,
            base_url,
            token,
        }
    }

    /// Searches articles stored under a location prefix.
    pub async fn search_by_location(
        &self,
        location_prefix: &str,
        warehouse_id: &str,
    ) -> Result<LocationSearch, ApiError> {
        let url = self.endpoint(
            "ubicaciones/articulos",
            &[("ubicacion", location_prefix), ("almacen", warehouse_id)],
        )?;
        let response = self.request(Method::GET, url).send().await?;
        let body: SearchResponse = parse_json(response).await?;

        debug!(
            stage = "api",
            prefix = %location_prefix,
            articles = body.articulos.len(),
            locations = body.ubicaciones.len(),
            "location search completed"
        );

        Ok(LocationSearch {
            articles: body
                .articulos
                .into_iter()
                .map(ArticleLocationRecord::from)
                .collect(),
            known_locations: body.ubicaciones,
        })
    }

    /// Fetches live inventory for a rack, keyed by `clave`.
    pub async fn inventory_by_location(
        &self,
        rack_code: &str,
        warehouse_id: &str,
    ) -> Result<HashMap<String, InventoryStatus>, ApiError> {
        let rows: Vec<InventoryRow> = self
            .fetch_rows("ubicaciones/inventario", rack_code, warehouse_id)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.clave,
                    InventoryStatus {
                        existencia: row.existencia,
                        estatus: StockStatus::from_wire(&row.estatus),
                    },
                )
            })
            .collect())
    }

    /// Fetches consecutive days out of stock for a rack, keyed by `clave`.
    pub async fn stockouts_by_location(
        &self,
        rack_code: &str,
        warehouse_id: &str,
    ) -> Result<HashMap<String, u32>, ApiError> {
        let rows: Vec<StockoutRow> = self
            .fetch_rows("ubicaciones/quiebres", rack_code, warehouse_id)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.clave, row.dias_quiebre))
            .collect())
    }

    /// Fetches rotation classes for a rack, keyed by article id.
    ///
    /// Rows with an unrecognised class letter are skipped; merging falls back to `D` for them.
    pub async fn classification_by_location(
        &self,
        rack_code: &str,
        warehouse_id: &str,
    ) -> Result<HashMap<u64, ArticleClass>, ApiError> {
        let rows: Vec<ClassRow> = self
            .fetch_rows("ubicaciones/clasificacion", rack_code, warehouse_id)
            .await?;
        let mut classes = HashMap::with_capacity(rows.len());
        for row in rows {
            match ArticleClass::from_letter(&row.clase) {
                Some(class) => {
                    classes.insert(row.articulo_id, class);
                }
                None => {
                    warn!(stage = "api", article_id = row.articulo_id, clase = %row.clase, "ignoring unknown class letter");
                }
            }
        }
        Ok(classes)
    }

    async fn fetch_rows<T>(
        &self,
        path: &str,
        rack_code: &str,
        warehouse_id: &str,
    ) -> Result<Vec<T>, ApiError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(path, &[("rack", rack_code), ("almacen", warehouse_id)])?;
        let response = self.request(Method::GET, url).send().await?;
        let body: DataResponse<T> = parse_json(response).await?;
        Ok(body.data)
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = self.base_url.join(path)?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

/// Result of a location search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationSearch {
    pub articles: Vec<ArticleLocationRecord>,
    pub known_locations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    articulos: Vec<SearchArticle>,
    #[serde(default)]
    ubicaciones: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArticle {
    articulo_id: u64,
    clave: String,
    #[serde(default)]
    nombre: Option<String>,
    ubicacion: String,
}

impl From<SearchArticle> for ArticleLocationRecord {
    fn from(value: SearchArticle) -> Self {
        ArticleLocationRecord::new(
            value.articulo_id,
            value.clave,
            value.nombre.unwrap_or_default(),
            value.ubicacion,
        )
    }
}

#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct InventoryRow {
    clave: String,
    #[serde(default)]
    existencia: i64,
    #[serde(default)]
    estatus: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StockoutRow {
    clave: String,
    #[serde(default)]
    dias_quiebre: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassRow {
    articulo_id: u64,
    clase: String,
}

/// Errors produced by the warehouse client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

async fn parse_json<T>(response: Response) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(ApiError::Status { status, body });
    }

    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer, token: Option<&str>) -> WarehouseClient {
        let base = Url::parse(&server.url("/api/")).expect("url");
        WarehouseClient::new(
            base,
            token.map(str::to_string),
            Client::builder().build().expect("client"),
        )
    }

    #[tokio::test]
    async fn search_parses_articles_and_locations() {
        let server = MockServer::start_async().await;
        let client = client(&server, Some("token"));

        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/ubicaciones/articulos")
                    .query_param("ubicacion", "N1-09")
                    .query_param("almacen", "ALM-1")
                    .header("Authorization", "Bearer token");
                then.status(200).json_body(json!({
                    "articulos": [
                        {
                            "articuloId": 10,
                            "clave": "A1",
                            "nombre": "Tornillo",
                            "ubicacion": "N1-09-02-15"
                        },
                        {
                            "articuloId": 11,
                            "clave": "A2",
                            "ubicacion": "N1-09-01-01"
                        }
                    ],
                    "ubicaciones": ["N1-09-02-16"]
                }));
            })
            .await;

        let result = client
            .search_by_location("N1-09", "ALM-1")
            .await
            .expect("search");
        mock.assert_async().await;

        assert_eq!(result.articles.len(), 2);
        assert_eq!(result.articles[0].article_id, 10);
        assert_eq!(result.articles[0].location_code, "N1-09-02-15");
        assert_eq!(result.articles[1].name, "");
        assert!(result.articles[0].existencia.is_none());
        assert_eq!(result.known_locations, vec!["N1-09-02-16".to_string()]);
    }

    #[tokio::test]
    async fn search_tolerates_missing_lists() {
        let server = MockServer::start_async().await;
        let client = client(&server, None);

        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/ubicaciones/articulos");
                then.status(200).json_body(json!({}));
            })
            .await;

        let result = client
            .search_by_location("N9-99", "ALM-1")
            .await
            .expect("search");
        assert_eq!(result, LocationSearch::default());
    }

    #[tokio::test]
    async fn inventory_is_keyed_by_clave() {
        let server = MockServer::start_async().await;
        let client = client(&server, None);

        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/ubicaciones/inventario")
                    .query_param("rack", "N1-09")
                    .query_param("almacen", "ALM-1");
                then.status(200).json_body(json!({
                    "data": [
                        { "clave": "A1", "existencia": 40, "estatus": "DISPONIBLE" },
                        { "clave": "A2", "existencia": 0, "estatus": "EN_TRANSITO" }
                    ]
                }));
            })
            .await;

        let inventory = client
            .inventory_by_location("N1-09", "ALM-1")
            .await
            .expect("inventory");
        mock.assert_async().await;

        assert_eq!(inventory["A1"].existencia, 40);
        assert_eq!(inventory["A1"].estatus, StockStatus::Disponible);
        assert_eq!(
            inventory["A2"].estatus,
            StockStatus::Other("EN_TRANSITO".to_string())
        );
    }

    #[tokio::test]
    async fn stockouts_are_keyed_by_clave() {
        let server = MockServer::start_async().await;
        let client = client(&server, None);

        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/ubicaciones/quiebres")
                    .query_param("rack", "N1-09");
                then.status(200).json_body(json!({
                    "data": [
                        { "clave": "A1", "diasQuiebre": 3 },
                        { "clave": "A2" }
                    ]
                }));
            })
            .await;

        let stockouts = client
            .stockouts_by_location("N1-09", "ALM-1")
            .await
            .expect("stockouts");
        assert_eq!(stockouts.get("A1"), Some(&3));
        assert_eq!(stockouts.get("A2"), Some(&0));
    }

    #[tokio::test]
    async fn classification_is_keyed_by_article_id_and_skips_unknown_letters() {
        let server = MockServer::start_async().await;
        let client = client(&server, None);

        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/ubicaciones/clasificacion")
                    .query_param("rack", "N1-09")
                    .query_param("almacen", "ALM-1");
                then.status(200).json_body(json!({
                    "data": [
                        { "articuloId": 10, "clase": "A" },
                        { "articuloId": 11, "clase": "b" },
                        { "articuloId": 12, "clase": "Z" }
                    ]
                }));
            })
            .await;

        let classes = client
            .classification_by_location("N1-09", "ALM-1")
            .await
            .expect("classification");
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[&10], ArticleClass::A);
        assert_eq!(classes[&11], ArticleClass::B);
        assert!(!classes.contains_key(&12));
    }

    #[tokio::test]
    async fn error_status_returns_message() {
        let server = MockServer::start_async().await;
        let client = client(&server, None);

        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/ubicaciones/quiebres");
                then.status(503).body("mantenimiento");
            })
            .await;

        let err = client
            .stockouts_by_location("N1-09", "ALM-1")
            .await
            .expect_err("should error");
        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "mantenimiento");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_an_http_error() {
        let server = MockServer::start_async().await;
        let client = client(&server, None);

        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/ubicaciones/inventario");
                then.status(200).body("not json");
            })
            .await;

        let err = client
            .inventory_by_location("N1-09", "ALM-1")
            .await
            .expect_err("should error");
        assert!(matches!(err, ApiError::Http(_)));
    }
}
