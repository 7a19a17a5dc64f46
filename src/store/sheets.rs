use super::{RowStore, StoreError};
use crate::row::{Row, COLUMN_COUNT, LAST_COLUMN};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const TOKEN_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        serde_json::from_str(raw).map_err(|e| StoreError::Credentials(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Google Sheets v4 over HTTPS, authenticated as a service account.
pub struct GoogleSheets {
    client: Client,
    key: ServiceAccountKey,
    spreadsheet_id: String,
    sheet_name: String,
    token: Mutex<Option<AccessToken>>,
}

impl GoogleSheets {
    pub fn new(key: ServiceAccountKey, spreadsheet_id: String, sheet_name: String) -> Self {
        GoogleSheets {
            client: Client::new(),
            key,
            spreadsheet_id,
            sheet_name,
            token: Mutex::new(None),
        }
    }

    /// Fetches a first access token so bad credentials fail at startup.
    pub async fn connect(self) -> Result<Self, StoreError> {
        self.access_token().await?;
        Ok(self)
    }

    fn full_range(&self) -> String {
        format!("{}!A:{}", self.sheet_name, LAST_COLUMN)
    }

    fn row_range(&self, position: usize) -> String {
        let number = position + 1;
        format!("{}!A{number}:{}{number}", self.sheet_name, LAST_COLUMN)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = Url::parse(SHEETS_BASE).map_err(|e| StoreError::Decode(e.to_string()))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| StoreError::Decode("sheets base url cannot be a base".to_string()))?;
            path.push(&self.spreadsheet_id);
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    #[instrument(name = "sheets_access_token", skip(self))]
    async fn access_token(&self) -> Result<String, StoreError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }
        let token_uri = self.key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SCOPE,
            aud: token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };
        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &signing_key)?;
        let resp = self
            .client
            .post(token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let token: TokenResponse = resp.json().await?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(TOKEN_LIFETIME_SECS as u64));
        debug!(expires_in = lifetime.as_secs(), "obtained sheets access token");
        *cached = Some(AccessToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, StoreError> {
        let token = self.access_token().await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }
}

#[async_trait]
impl RowStore for GoogleSheets {
    #[instrument(name = "sheets_read_rows", skip(self))]
    async fn read_rows(&self) -> Result<Vec<Row>, StoreError> {
        let url = self.url(&["values", self.full_range().as_str()])?;
        let resp = self.request(Method::GET, url).await?.send().await?;
        let range: ValueRange = check_status(resp).await?.json().await?;
        Ok(range
            .values
            .into_iter()
            .map(|cells| cells.iter().map(cell_text).collect())
            .collect())
    }

    #[instrument(name = "sheets_append_row", skip(self, row))]
    async fn append_row(&self, row: Row) -> Result<(), StoreError> {
        let mut url = self.url(&["values", format!("{}:append", self.full_range()).as_str()])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let resp = self
            .request(Method::POST, url)
            .await?
            .json(&json!({ "values": [row] }))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    #[instrument(name = "sheets_write_row", skip(self, row))]
    async fn write_row(&self, position: usize, row: Row) -> Result<(), StoreError> {
        debug_assert_eq!(row.len(), COLUMN_COUNT);
        let range = self.row_range(position);
        let mut url = self.url(&["values", range.as_str()])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let resp = self
            .request(Method::PUT, url)
            .await?
            .json(&json!({ "range": range, "values": [row] }))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    #[instrument(name = "sheets_sheet_id", skip(self))]
    async fn sheet_id(&self) -> Result<i64, StoreError> {
        let mut url = self.url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title)");
        let resp = self.request(Method::GET, url).await?.send().await?;
        let spreadsheet: Spreadsheet = check_status(resp).await?.json().await?;
        spreadsheet
            .sheets
            .into_iter()
            .find(|s| s.properties.title == self.sheet_name)
            .map(|s| s.properties.sheet_id)
            .ok_or_else(|| StoreError::SheetMissing(self.sheet_name.clone()))
    }

    #[instrument(name = "sheets_delete_row", skip(self))]
    async fn delete_row(&self, sheet_id: i64, position: usize) -> Result<(), StoreError> {
        let url = self.url(&[])?;
        let url = Url::parse(&format!("{}:batchUpdate", url))
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let body = json!({
            "requests": [{
                "deleteDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": "ROWS",
                        "startIndex": position,
                        "endIndex": position + 1,
                    }
                }
            }]
        });
        let resp = self
            .request(Method::POST, url)
            .await?
            .json(&body)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Status { status, body })
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheets() -> GoogleSheets {
        GoogleSheets::new(
            ServiceAccountKey {
                client_email: "svc@example.iam.gserviceaccount.com".into(),
                private_key: String::new(),
                token_uri: None,
            },
            "spread-123".into(),
            "シート1".into(),
        )
    }

    #[test]
    fn ranges_use_one_based_row_numbers() {
        let s = sheets();
        assert_eq!(s.full_range(), "シート1!A:I");
        assert_eq!(s.row_range(3), "シート1!A4:I4");
    }

    #[test]
    fn urls_percent_encode_sheet_names() {
        let s = sheets();
        let url = s.url(&["values", s.full_range().as_str()]).unwrap();
        assert!(url.as_str().starts_with(
            "https://sheets.googleapis.com/v4/spreadsheets/spread-123/values/"
        ));
        assert!(!url.as_str().contains("シート"));
        assert!(url.as_str().contains("!A:I"));
    }

    #[test]
    fn cells_are_read_as_text() {
        assert_eq!(cell_text(&Value::Bool(true)), "true");
        assert_eq!(cell_text(&json!(12)), "12");
        assert_eq!(cell_text(&json!("x")), "x");
        assert_eq!(cell_text(&Value::Null), "");
    }

    #[test]
    fn credentials_parse_from_service_account_json() {
        let key = ServiceAccountKey::from_json(
            r#"{"type":"service_account","client_email":"a@b","private_key":"pem","token_uri":"https://t"}"#,
        )
        .unwrap();
        assert_eq!(key.client_email, "a@b");
        assert_eq!(key.token_uri.as_deref(), Some("https://t"));
        assert!(matches!(
            ServiceAccountKey::from_json("{}"),
            Err(StoreError::Credentials(_))
        ));
    }
}
