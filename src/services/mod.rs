//! Business logic services

pub mod catalog;
pub mod circulation;
pub mod email;
pub mod overview;
pub mod reviews;
pub mod users;
pub mod waitlist;

use std::sync::Arc;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
    pub circulation: circulation::CirculationService,
    pub waitlist: waitlist::WaitlistService,
    pub reviews: reviews::ReviewsService,
    pub overview: overview::OverviewService,
    pub email: email::EmailService,
}

impl Services {
    /// Create all services with the given repository and mail backend
    pub fn new(repository: Repository, config: &AppConfig, mailer: Arc<dyn email::Mailer>) -> Self {
        let email = email::EmailService::new(
            mailer,
            &config.email,
            config.auth.token_ttl_minutes,
        );
        let waitlist = waitlist::WaitlistService::new(repository.clone(), email.clone());

        Self {
            catalog: catalog::CatalogService::new(repository.clone(), waitlist.clone()),
            users: users::UsersService::new(repository.clone(), config.auth.clone(), email.clone()),
            circulation: circulation::CirculationService::new(
                repository.clone(),
                waitlist.clone(),
                config.circulation.daily_fine,
            ),
            waitlist,
            reviews: reviews::ReviewsService::new(repository.clone()),
            overview: overview::OverviewService::new(repository),
            email,
        }
    }
}
