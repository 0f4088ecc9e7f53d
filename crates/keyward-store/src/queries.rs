//! GraphQL documents sent to the backend.
//!
//! Table and column names follow the Hasura schema the service is deployed
//! against: `auth_accounts`, `auth_account_roles`, `auth_account_providers`,
//! `auth_refresh_tokens` and `users`.

/// Selection set for an account row.
macro_rules! account_fields {
    () => {
        "id user_id email new_email password_hash active default_role \
         ticket ticket_expires_at locale created_at updated_at \
         account_roles { role }"
    };
}

/// Selection set for a user row.
macro_rules! user_fields {
    () => {
        "id display_name avatar_url email created_at"
    };
}

/// Fetch an account by primary key.
pub const ACCOUNT_BY_ID: &str = concat!(
    "query ($id: uuid!) { auth_accounts_by_pk(id: $id) { ",
    account_fields!(),
    " } }"
);

/// Fetch the account of a user.
pub const ACCOUNT_BY_USER_ID: &str = concat!(
    "query ($user_id: uuid!) { auth_accounts(where: {user_id: {_eq: $user_id}}, limit: 1) { ",
    account_fields!(),
    " } }"
);

/// Fetch an account by email.
pub const ACCOUNT_BY_EMAIL: &str = concat!(
    "query ($email: citext!) { auth_accounts(where: {email: {_eq: $email}}, limit: 1) { ",
    account_fields!(),
    " } }"
);

/// Fetch the account currently holding a ticket.
pub const ACCOUNT_BY_TICKET: &str = concat!(
    "query ($ticket: String!) { auth_accounts(where: {ticket: {_eq: $ticket}}, limit: 1) { ",
    account_fields!(),
    " } }"
);

/// Fetch the account linked to a provider identity.
pub const ACCOUNT_BY_PROVIDER: &str = concat!(
    "query ($provider: String!, $provider_user_id: String!) { ",
    "auth_account_providers(where: {auth_provider: {_eq: $provider}, ",
    "auth_provider_unique_id: {_eq: $provider_user_id}}, limit: 1) { account { ",
    account_fields!(),
    " } } }"
);

/// Create a user with its nested account, roles and provider links.
pub const INSERT_USER_WITH_ACCOUNT: &str = concat!(
    "mutation ($user: users_insert_input!) { insert_users_one(object: $user) { ",
    user_fields!(),
    " account { ",
    account_fields!(),
    " } } }"
);

/// Fetch a user profile by primary key.
pub const USER_BY_ID: &str = concat!(
    "query ($id: uuid!) { users_by_pk(id: $id) { ",
    user_fields!(),
    " } }"
);

/// Link a provider identity to an account.
pub const LINK_PROVIDER: &str = "mutation ($account_id: uuid!, $provider: String!, $provider_user_id: String!) { \
    insert_auth_account_providers_one(object: {account_id: $account_id, auth_provider: $provider, \
    auth_provider_unique_id: $provider_user_id}) { id } }";

/// Write a ticket, its expiry and the pending email onto an account.
pub const SET_TICKET: &str = "mutation ($id: uuid!, $ticket: String!, $expires_at: timestamptz!, $new_email: citext) { \
    update_auth_accounts(where: {id: {_eq: $id}}, \
    _set: {ticket: $ticket, ticket_expires_at: $expires_at, new_email: $new_email}) { affected_rows } }";

/// Conditionally update accounts. Used for ticket consumption, where the
/// `where` clause carries the ticket match and the expiry check.
pub const UPDATE_ACCOUNTS_WHERE: &str = concat!(
    "mutation ($where: auth_accounts_bool_exp!, $set: auth_accounts_set_input!) { ",
    "update_auth_accounts(where: $where, _set: $set) { affected_rows returning { ",
    account_fields!(),
    " } } }"
);

/// Replace an account's email and clear the pending one.
pub const UPDATE_EMAIL: &str = "mutation ($id: uuid!, $email: citext!) { \
    update_auth_accounts(where: {id: {_eq: $id}}, _set: {email: $email, new_email: null}) { affected_rows } }";

/// Replace an account's password hash.
pub const UPDATE_PASSWORD: &str = "mutation ($id: uuid!, $password_hash: String!) { \
    update_auth_accounts(where: {id: {_eq: $id}}, _set: {password_hash: $password_hash}) { affected_rows } }";

/// Delete an account and everything hanging off it, in one transaction.
pub const DELETE_ACCOUNT: &str = "mutation ($account_id: uuid!, $user_id: uuid!) { \
    delete_auth_refresh_tokens(where: {account_id: {_eq: $account_id}}) { affected_rows } \
    delete_auth_account_providers(where: {account_id: {_eq: $account_id}}) { affected_rows } \
    delete_auth_account_roles(where: {account_id: {_eq: $account_id}}) { affected_rows } \
    delete_auth_accounts(where: {id: {_eq: $account_id}}) { affected_rows } \
    delete_users(where: {id: {_eq: $user_id}}) { affected_rows } }";

/// Persist a refresh token digest.
pub const INSERT_REFRESH_TOKEN: &str = "mutation ($digest: String!, $account_id: uuid!, $expires_at: timestamptz!) { \
    insert_auth_refresh_tokens_one(object: {refresh_token: $digest, account_id: $account_id, \
    expires_at: $expires_at}) { refresh_token } }";

/// Delete a live refresh token and return it.
pub const TAKE_REFRESH_TOKEN: &str = "mutation ($digest: String!, $now: timestamptz!) { \
    delete_auth_refresh_tokens(where: {refresh_token: {_eq: $digest}, expires_at: {_gt: $now}}) { \
    returning { refresh_token account_id expires_at } } }";

/// Delete one refresh token.
pub const DELETE_REFRESH_TOKEN: &str = "mutation ($digest: String!) { \
    delete_auth_refresh_tokens(where: {refresh_token: {_eq: $digest}}) { affected_rows } }";

/// Delete every refresh token of an account.
pub const DELETE_REFRESH_TOKENS: &str = "mutation ($account_id: uuid!) { \
    delete_auth_refresh_tokens(where: {account_id: {_eq: $account_id}}) { affected_rows } }";
