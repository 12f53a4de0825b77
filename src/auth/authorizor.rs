use oso::{Oso, OsoError, PolarClass};

use crate::auth::User;
use crate::entities::TransportRequest;

pub fn new() -> Result<Oso, OsoError> {
    let mut o = Oso::new();

    o.register_class(User::get_polar_class())?;
    o.register_class(TransportRequest::get_polar_class())?;

    o.load_str(include_str!("rules.polar"))?;

    Ok(o)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::entities::request::sample_input;
    use uuid::Uuid;

    fn user(role: Role) -> User {
        User::new(Uuid::new_v4(), role)
    }

    #[test]
    fn admin_actions() {
        let authorizor = new().unwrap();
        let admin = user(Role::Admin);
        let request = TransportRequest::new(Uuid::new_v4(), sample_input());

        for action in ["read", "list_bids", "assign", "reassign", "cancel", "track"] {
            let result = authorizor.is_allowed(admin.clone(), action, request.clone());
            assert_eq!(result.unwrap(), true, "admin should be allowed to {}", action);
        }

        let result = authorizor.is_allowed(admin.clone(), "submit_bid", request.clone());
        assert_eq!(result.unwrap(), false);

        let result = authorizor.is_allowed(admin.clone(), "publish_location", request.clone());
        assert_eq!(result.unwrap(), false);

        let result = authorizor.is_allowed(admin.clone(), "list_bids", user(Role::Driver));
        assert_eq!(result.unwrap(), true);
    }

    #[test]
    fn client_owns_requests() {
        let authorizor = new().unwrap();
        let owner = user(Role::Client);
        let stranger = user(Role::Client);
        let request = TransportRequest::new(owner.id, sample_input());

        for action in ["read", "list_bids", "track"] {
            let result = authorizor.is_allowed(owner.clone(), action, request.clone());
            assert_eq!(result.unwrap(), true);

            let result = authorizor.is_allowed(stranger.clone(), action, request.clone());
            assert_eq!(result.unwrap(), false);
        }

        for action in ["assign", "reassign", "cancel", "submit_bid", "start"] {
            let result = authorizor.is_allowed(owner.clone(), action, request.clone());
            assert_eq!(result.unwrap(), false);
        }
    }

    #[test]
    fn driver_sees_open_market_and_own_jobs() {
        let authorizor = new().unwrap();
        let driver = user(Role::Driver);
        let other = user(Role::Driver);
        let mut request = TransportRequest::new(Uuid::new_v4(), sample_input());

        // before assignment

        let result = authorizor.is_allowed(driver.clone(), "read", request.clone());
        assert_eq!(result.unwrap(), true);

        let result = authorizor.is_allowed(driver.clone(), "submit_bid", request.clone());
        assert_eq!(result.unwrap(), true);

        let result = authorizor.is_allowed(driver.clone(), "list_bids", request.clone());
        assert_eq!(result.unwrap(), false);

        let result = authorizor.is_allowed(driver.clone(), "start", request.clone());
        assert_eq!(result.unwrap(), false);

        request.assign(driver.id).unwrap();

        // after assignment

        for action in ["read", "start", "complete", "track", "publish_location"] {
            let result = authorizor.is_allowed(driver.clone(), action, request.clone());
            assert_eq!(result.unwrap(), true, "assigned driver should be allowed to {}", action);

            let result = authorizor.is_allowed(other.clone(), action, request.clone());
            assert_eq!(result.unwrap(), false, "other driver should not be allowed to {}", action);
        }

        let result = authorizor.is_allowed(driver.clone(), "cancel", request.clone());
        assert_eq!(result.unwrap(), false);
    }

    #[test]
    fn accounts_are_private() {
        let authorizor = new().unwrap();
        let driver = user(Role::Driver);
        let client = user(Role::Client);

        let result = authorizor.is_allowed(driver.clone(), "read", driver.clone());
        assert_eq!(result.unwrap(), true);

        let result = authorizor.is_allowed(client.clone(), "read", driver.clone());
        assert_eq!(result.unwrap(), false);

        let result = authorizor.is_allowed(driver.clone(), "list_bids", driver.clone());
        assert_eq!(result.unwrap(), true);

        let result = authorizor.is_allowed(client.clone(), "list_bids", driver.clone());
        assert_eq!(result.unwrap(), false);
    }
}
