use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::subscriptionmodel::PlanType;
use crate::models::usermodel::UserRole;

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct UpdateProfileDto {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,

    pub role: UserRole,

    #[validate(length(min = 1, max = 100, message = "District must be between 1 and 100 characters"))]
    pub district: String,

    #[validate(length(min = 1, max = 100, message = "City must be between 1 and 100 characters"))]
    pub city: String,

    pub phone: Option<String>,

    /// Reference returned by the media storage collaborator; never a blob.
    #[validate(url(message = "Invalid avatar URL"))]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PurchaseSubscriptionDto {
    pub plan: PlanType,
}

#[derive(Debug, Serialize)]
pub struct EntitlementResponse {
    pub entitled: bool,
    pub remaining_ads: i32,
}
