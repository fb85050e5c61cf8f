use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::types::{
    ApiError, CATEGORY_ENTRY_ALREADY_EXISTS, CategoryAdd, CategoryPage, EntryPage,
    METADATA_OBJECT_TYPE_ENTRY, MediaEntryFilter, MetadataPage, MetadataProfilePage,
    MetadataRecord, Pager,
};

const SESSION_TYPE_ADMIN: i32 = 2;
const SESSION_EXPIRY_SECS: i64 = 86400;
const SESSION_PRIVILEGES: &str = "disableentitlement,list:*,update:*";

/// The subset of the catalog API the sync touches. Split out as a trait so
/// the driver and processors run against an in-memory catalog in tests.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn list_entries(&self, filter: &MediaEntryFilter, pager: &Pager) -> Result<EntryPage>;

    async fn update_entry_tags(&self, entry_id: &str, tags: &str) -> Result<()>;

    /// The metadata record for (object, profile), if any. At most one exists.
    async fn find_metadata(&self, profile_id: i32, object_id: &str)
    -> Result<Option<MetadataRecord>>;

    async fn add_metadata(&self, profile_id: i32, object_id: &str, xml: &str) -> Result<()>;

    async fn update_metadata(&self, record_id: i64, xml: &str) -> Result<()>;

    async fn add_entry_to_category(&self, entry_id: &str, category_id: i32)
    -> Result<CategoryAdd>;
}

/// HTTP client for the catalog's service/action API. All calls are POST
/// with a JSON body carrying the admin session token.
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
    session: String,
}

impl CatalogClient {
    /// Builds the client and establishes an admin session from the partner
    /// id and administrator secret.
    pub async fn connect(service_url: &str, partner_id: i32, admin_secret: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        let mut client = CatalogClient {
            http,
            base_url: service_url.trim_end_matches('/').to_string(),
            session: String::new(),
        };

        let body = json!({
            "partnerId": partner_id,
            "secret": admin_secret,
            "type": SESSION_TYPE_ADMIN,
            "expiry": SESSION_EXPIRY_SECS,
            "privileges": SESSION_PRIVILEGES,
        });
        client.session = client
            .call("session", "start", body)
            .await
            .context("session start failed")?;
        info!(partner_id, "catalog session established");
        Ok(client)
    }

    /// Resolves a metadata profile id from its display name.
    pub async fn metadata_profile_id(&self, name: &str) -> Result<i32> {
        let body = json!({
            "filter": { "metadataObjectTypeEqual": METADATA_OBJECT_TYPE_ENTRY },
        });
        let page: MetadataProfilePage = self.call("metadata_metadataprofile", "list", body).await?;
        page.objects
            .into_iter()
            .find(|profile| profile.name == name)
            .map(|profile| profile.id)
            .with_context(|| format!("no metadata profile named {:?}", name))
    }

    /// Resolves a category id from its full (slash-delimited) name.
    pub async fn category_id_by_full_name(&self, full_name: &str) -> Result<i32> {
        let body = json!({
            "filter": { "fullNameEqual": full_name },
        });
        let page: CategoryPage = self.call("category", "list", body).await?;
        page.objects
            .into_iter()
            .next()
            .map(|category| category.id)
            .with_context(|| format!("no category with full name {:?}", full_name))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        service: &str,
        action: &str,
        mut body: Value,
    ) -> Result<T> {
        let fields = body
            .as_object_mut()
            .context("catalog request body must be a JSON object")?;
        fields.insert("format".into(), json!(1));
        if !self.session.is_empty() {
            fields.insert("ks".into(), json!(self.session));
        }

        let url = format!("{}/api_v3/service/{service}/action/{action}", self.base_url);
        debug!(service, action, "catalog call");
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("catalog call {service}/{action} failed to send"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("catalog call {service}/{action} returned HTTP {status}");
        }

        let value: Value = response
            .json()
            .await
            .with_context(|| format!("catalog call {service}/{action} returned invalid JSON"))?;
        if let Some(api_error) = as_api_error(&value) {
            return Err(anyhow::Error::new(api_error)
                .context(format!("catalog call {service}/{action} rejected")));
        }
        serde_json::from_value(value)
            .with_context(|| format!("unexpected response shape from {service}/{action}"))
    }
}

/// The API signals failures in-band with an exception envelope instead of an
/// HTTP error status.
fn as_api_error(value: &Value) -> Option<ApiError> {
    let object_type = value.get("objectType")?.as_str()?;
    if !object_type.ends_with("APIException") {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

#[async_trait]
impl CatalogApi for CatalogClient {
    async fn list_entries(&self, filter: &MediaEntryFilter, pager: &Pager) -> Result<EntryPage> {
        let body = json!({ "filter": filter, "pager": pager });
        self.call("media", "list", body).await
    }

    async fn update_entry_tags(&self, entry_id: &str, tags: &str) -> Result<()> {
        let body = json!({
            "entryId": entry_id,
            "mediaEntry": { "tags": tags },
        });
        let _: Value = self.call("media", "update", body).await?;
        Ok(())
    }

    async fn find_metadata(
        &self,
        profile_id: i32,
        object_id: &str,
    ) -> Result<Option<MetadataRecord>> {
        let body = json!({
            "filter": {
                "metadataObjectTypeEqual": METADATA_OBJECT_TYPE_ENTRY,
                "metadataProfileIdEqual": profile_id,
                "objectIdEqual": object_id,
            },
        });
        let page: MetadataPage = self.call("metadata_metadata", "list", body).await?;
        Ok(page.objects.into_iter().next())
    }

    async fn add_metadata(&self, profile_id: i32, object_id: &str, xml: &str) -> Result<()> {
        let body = json!({
            "metadataProfileId": profile_id,
            "objectType": METADATA_OBJECT_TYPE_ENTRY,
            "objectId": object_id,
            "xmlData": xml,
        });
        let _: Value = self.call("metadata_metadata", "add", body).await?;
        Ok(())
    }

    async fn update_metadata(&self, record_id: i64, xml: &str) -> Result<()> {
        let body = json!({
            "id": record_id,
            "xmlData": xml,
        });
        let _: Value = self.call("metadata_metadata", "update", body).await?;
        Ok(())
    }

    async fn add_entry_to_category(
        &self,
        entry_id: &str,
        category_id: i32,
    ) -> Result<CategoryAdd> {
        let body = json!({
            "categoryEntry": { "entryId": entry_id, "categoryId": category_id },
        });
        match self.call::<Value>("categoryentry", "add", body).await {
            Ok(_) => Ok(CategoryAdd::Added),
            Err(err) => match err.downcast_ref::<ApiError>() {
                Some(api_error) if api_error.code == CATEGORY_ENTRY_ALREADY_EXISTS => {
                    Ok(CategoryAdd::AlreadyMember)
                }
                _ => Err(err),
            },
        }
    }
}
