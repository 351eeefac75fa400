pub mod chatdb;
pub mod db;
pub mod jobdb;
pub mod ledgerdb;
pub mod subscriptiondb;
pub mod userdb;
