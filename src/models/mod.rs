pub mod chatmodel;
pub mod jobmodel;
pub mod ledgermodel;
pub mod subscriptionmodel;
pub mod usermodel;
