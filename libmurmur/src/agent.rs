//! Agent facade
//!
//! Wires configuration, stores, the OAuth2 session, the platform client and
//! the model into the pipeline and the engagement collector, so that an outer
//! scheduler only has to call [`Agent::run_pass`] and
//! [`Agent::collect_engagement`] on its own cadence.
//!
//! ```no_run
//! use libmurmur::{Agent, Config};
//!
//! # async fn example() -> libmurmur::Result<()> {
//! let agent = Agent::from_config(Config::load()?).await?;
//! let outcome = agent.run_pass(false).await?;
//! println!("would reply to {} posts", outcome.replied.len());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::auth::{
    AuthorizationRequest, CredentialProvider, OAuthClientConfig, OAuthSessionManager,
    SessionState,
};
use crate::community::{follow_accounts, FollowOutcome};
use crate::config::{secret_from_env, Config, TokenBackend};
use crate::db::Database;
use crate::engagement::{CollectionSummary, EngagementCollector};
use crate::error::{PlatformError, Result};
use crate::model::{ChatCompletionModel, LanguageModel};
use crate::pipeline::{DecisionPipeline, PassOutcome};
use crate::platforms::{Platform, PlatformClient};
use crate::store::{
    CommunityStore, EngagementStore, FileTokenStore, KeyringTokenStore, MemoryStore, PostStore,
    TokenStore,
};
use crate::types::{TokenRecord, UserRecord};

/// Persistence the agent runs against
pub struct Stores {
    pub tokens: Arc<dyn TokenStore>,
    pub posts: Arc<dyn PostStore>,
    pub engagement: Arc<dyn EngagementStore>,
    pub community: Arc<dyn CommunityStore>,
}

impl Stores {
    /// Everything in one process-local store
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            tokens: store.clone(),
            posts: store.clone(),
            engagement: store.clone(),
            community: store,
        }
    }

    /// Open the stores named in `[storage]`
    pub async fn from_config(config: &Config) -> Result<Self> {
        let db = Arc::new(match &config.storage.database_path {
            Some(path) => Database::new(path).await?,
            None => Database::in_memory().await?,
        });

        let tokens: Arc<dyn TokenStore> = match config.storage.token_backend {
            TokenBackend::Memory => Arc::new(MemoryStore::new()),
            TokenBackend::File => Arc::new(FileTokenStore::new(&config.storage.token_path)),
            TokenBackend::Keyring => Arc::new(KeyringTokenStore::new()?),
            TokenBackend::Sqlite => db.clone(),
        };

        Ok(Self {
            tokens,
            posts: db.clone(),
            engagement: db.clone(),
            community: db,
        })
    }
}

pub struct Agent {
    config: Config,
    platform: Arc<PlatformClient>,
    session: Option<Arc<Mutex<OAuthSessionManager>>>,
    pipeline: DecisionPipeline,
    collector: EngagementCollector,
    community: Arc<dyn CommunityStore>,
}

impl Agent {
    /// Build the agent from the default config location
    pub async fn new() -> Result<Self> {
        Self::from_config(Config::load()?).await
    }

    pub async fn from_config(config: Config) -> Result<Self> {
        let stores = Stores::from_config(&config).await?;
        let timeout = Duration::from_secs(config.platform.request_timeout_secs);
        let model = Arc::new(ChatCompletionModel::new(&config.model, timeout)?);
        Self::from_parts(config, stores, model).await
    }

    /// Build the agent around caller-supplied stores and model
    ///
    /// Restores any persisted session for the configured account.
    pub async fn from_parts(
        config: Config,
        stores: Stores,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        let credentials = match &config.platform.bearer_token_env {
            Some(var) => CredentialProvider::StaticBearer(secret_from_env(var)?),
            None => {
                let http = reqwest::Client::builder()
                    .timeout(Duration::from_secs(config.platform.request_timeout_secs))
                    .build()
                    .map_err(|e| PlatformError::Network(e.to_string()))?;
                let mut session = OAuthSessionManager::new(
                    http,
                    OAuthClientConfig::from_config(&config)?,
                    config.account.id.clone(),
                    stores.tokens.clone(),
                );
                let state = session.load().await?;
                tracing::info!(account_id = %config.account.id, ?state, "Session restored");
                CredentialProvider::oauth2(session)
            }
        };
        let session = credentials.session();

        let platform = Arc::new(PlatformClient::new(
            credentials,
            &config.platform,
            config.account.id.clone(),
        )?);
        let as_platform: Arc<dyn Platform> = platform.clone();

        let pipeline = DecisionPipeline::new(
            as_platform.clone(),
            model,
            stores.posts.clone(),
            config.persona.clone(),
            config.account.id.clone(),
            config.pipeline.clone(),
        )
        .with_token_budgets(config.model.gate_max_tokens, config.model.reply_max_tokens);
        let collector = EngagementCollector::new(as_platform, stores.posts, stores.engagement);

        Ok(Self {
            config,
            platform,
            session,
            pipeline,
            collector,
            community: stores.community,
        })
    }

    /// Stop future passes between posts once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.pipeline = self.pipeline.with_cancellation(token);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn platform(&self) -> &PlatformClient {
        &self.platform
    }

    pub fn pipeline(&self) -> &DecisionPipeline {
        &self.pipeline
    }

    /// `None` when the agent uses an app-only bearer token
    pub fn session(&self) -> Option<Arc<Mutex<OAuthSessionManager>>> {
        self.session.clone()
    }

    pub async fn session_state(&self) -> Option<SessionState> {
        match &self.session {
            Some(session) => Some(session.lock().await.state()),
            None => None,
        }
    }

    pub async fn begin_authorization(&self) -> Result<AuthorizationRequest> {
        let session = self.require_session()?;
        let mut session = session.lock().await;
        session.begin_authorization(&[])
    }

    pub async fn complete_authorization(
        &self,
        code: &str,
        returned_state: &str,
        verifier: &str,
    ) -> Result<TokenRecord> {
        let session = self.require_session()?;
        let mut session = session.lock().await;
        session
            .complete_authorization(code, returned_state, verifier)
            .await
    }

    /// Revoke the current token and forget the session
    pub async fn logout(&self) -> Result<()> {
        let session = self.require_session()?;
        let mut session = session.lock().await;
        session.revoke(None).await
    }

    /// The authenticated user, as the platform sees it
    pub async fn whoami(&self) -> Result<UserRecord> {
        let me = self.platform.me().await?;
        if me.id != self.config.account.id {
            tracing::warn!(
                configured = %self.config.account.id,
                actual = %me.id,
                "Token belongs to a different account than configured"
            );
        }
        Ok(me)
    }

    pub async fn run_pass(&self, commit: bool) -> Result<PassOutcome> {
        self.pipeline.run_pass(commit).await
    }

    pub async fn collect_engagement(&self) -> Result<CollectionSummary> {
        self.collector.collect().await
    }

    /// Follow every account in `accounts_to_follow`
    pub async fn bootstrap_follows(&self) -> Vec<FollowOutcome> {
        follow_accounts(
            self.platform.as_ref(),
            self.community.as_ref(),
            &self.config.accounts_to_follow,
        )
        .await
    }

    fn require_session(&self) -> Result<&Arc<Mutex<OAuthSessionManager>>> {
        self.session.as_ref().ok_or_else(|| {
            crate::error::MurmurError::InvalidInput(
                "agent is configured with an app-only bearer token".to_string(),
            )
        })
    }
}
