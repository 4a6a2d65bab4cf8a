// ── Hosted backend ──
//
// REST for table operations, one realtime channel per subscribed table.

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use librohub_api::realtime::realtime_url;
use librohub_api::{
    ChannelSpec, Filter, Query, RealtimeHandle, ReconnectConfig, RestClient, Table, TlsMode,
    TransportConfig,
};

use super::{ChangeSubscription, DataService, ServiceResult};
use crate::config::{ServiceConfig, TlsVerification};
use crate::error::CoreError;

/// Data service backed by the hosted database.
#[derive(Clone)]
pub struct RemoteService {
    rest: RestClient,
    realtime_url: Url,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
}

impl RemoteService {
    /// Build the REST client and derive the realtime endpoint. No network
    /// traffic happens until the first call.
    pub fn new(config: &ServiceConfig) -> Result<Self, CoreError> {
        let transport = build_transport(config);
        let rest = RestClient::from_api_key(config.url.as_str(), &config.api_key, &transport)?;
        let realtime_url = realtime_url(config.url.as_str(), &config.api_key)?;

        Ok(Self {
            rest,
            realtime_url,
            reconnect: ReconnectConfig::default(),
            cancel: CancellationToken::new(),
        })
    }

    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Channel names follow the table: `books_changes`, `members_changes`, ...
    fn channel_for(table: Table) -> ChannelSpec {
        ChannelSpec::new(format!("{table}_changes"), table)
    }
}

impl DataService for RemoteService {
    async fn select(&self, query: &Query) -> ServiceResult<Vec<Value>> {
        self.rest.select(query).await
    }

    async fn insert(&self, table: Table, row: &Value) -> ServiceResult<Vec<Value>> {
        self.rest.insert(table, row).await
    }

    async fn update(
        &self,
        table: Table,
        patch: &Value,
        filters: &[Filter],
    ) -> ServiceResult<Vec<Value>> {
        self.rest.update(table, patch, filters).await
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> ServiceResult<()> {
        self.rest.delete(table, filters).await
    }

    async fn subscribe(&self, table: Table) -> ServiceResult<ChangeSubscription> {
        let channel = Self::channel_for(table);
        debug!(channel = %channel.name, "opening change channel");
        let handle = RealtimeHandle::connect(
            self.realtime_url.clone(),
            channel,
            self.reconnect.clone(),
            self.cancel.child_token(),
        );
        Ok(ChangeSubscription::realtime(table, handle))
    }
}

/// Build a [`TransportConfig`] from the service configuration.
fn build_transport(config: &ServiceConfig) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&config.tls),
        timeout: config.timeout,
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::time::Duration;

    #[test]
    fn channel_names_follow_tables() {
        assert_eq!(
            RemoteService::channel_for(Table::BorrowRecords).name,
            "borrow_records_changes"
        );
        assert_eq!(RemoteService::channel_for(Table::Books).name, "books_changes");
    }

    #[test]
    fn realtime_endpoint_is_derived_from_project_url() {
        let config = ServiceConfig {
            url: "https://abcd.example.co".parse().expect("valid url"),
            api_key: SecretString::from("anon".to_string()),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(5),
        };
        let service = RemoteService::new(&config).expect("builds");
        assert_eq!(service.realtime_url.scheme(), "wss");
        assert_eq!(service.realtime_url.path(), "/realtime/v1/websocket");
        assert_eq!(
            service.rest().base_url().as_str(),
            "https://abcd.example.co/rest/v1/"
        );
    }
}
