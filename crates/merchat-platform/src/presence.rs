use merchat_core::ids::{AccountUserId, ShopId};
use merchat_core::{Account, CoreError, Presence, Result};
use merchat_store::CredentialStore;
use tracing::{instrument, warn};

use crate::client::PlatformClient;

/// `set_presence` transitions (§4.11): call the platform first, then write
/// through the credential store. A post-success store write failure is
/// surfaced as `storage_error` — the platform is left ahead of storage
/// rather than rolled back, since there is no undo for `set_csstatus`.
#[instrument(skip(client, store), fields(channel = %account.channel, shop_id = %account.shop_id, account_user_id = %account.account_user_id, %target))]
pub async fn set_presence(
    client: &PlatformClient,
    store: &CredentialStore,
    account: &Account,
    target: Presence,
) -> Result<()> {
    let credentials = account
        .credentials
        .clone()
        .ok_or_else(|| CoreError::Remote { code: "no_credentials".into(), msg: "account has no credentials".into() })?;

    client.set_presence(&credentials, target.code()).await?;

    let shop_id: &ShopId = &account.shop_id;
    let account_user_id: &AccountUserId = &account.account_user_id;
    match store.update_presence(&account.channel, shop_id, account_user_id, target) {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(error = %e, "presence applied at platform but store write failed");
            Err(CoreError::Storage(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::login::FixtureLoginProvider;
    use crate::client::RetryPolicy;
    use std::sync::Arc;

    #[tokio::test]
    async fn rejects_account_without_credentials() {
        let store = Arc::new(CredentialStore::in_memory().unwrap());
        let client = PlatformClient::new("http://example.invalid", store.clone(), Arc::new(FixtureLoginProvider), RetryPolicy::default());

        let shop = ShopId::new("shop1");
        let acc_id = AccountUserId::new("acc1");
        store.add_account("pinduoduo", &shop, &acc_id, "user", "pass", None).unwrap();
        let account = store.get_account("pinduoduo", &shop, &acc_id).unwrap().unwrap();

        let err = set_presence(&client, &store, &account, Presence::Online).await.unwrap_err();
        assert_eq!(err.code(), "REMOTE_ERROR");
    }
}
