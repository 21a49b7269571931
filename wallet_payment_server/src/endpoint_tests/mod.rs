mod admin;
mod helpers;
mod mocks;
mod top_ups;
mod wallet;
mod webhooks;
