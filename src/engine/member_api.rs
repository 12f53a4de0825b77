use super::Engine;

use async_trait::async_trait;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::MemberAPI,
    auth::User,
    db::Store,
    entities::{Member, NewMember, Profile},
    error::{not_found_error, unexpected_error, Error},
};

#[async_trait]
impl<S: Store> MemberAPI for Engine<S> {
    #[tracing::instrument(skip_all, fields(role = %input.role.name()))]
    async fn create_member(&self, input: NewMember) -> Result<Profile, Error> {
        let input = input.normalized();
        input.validate()?;

        let password = input.password.clone();
        let cost = self.password_cost;

        // hashing blocks the calling thread
        let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|_| unexpected_error())??;

        let member = Member::new(input, password_hash);
        self.store.insert_member(&member).await?;

        tracing::info!(member_id = %member.id, "member registered");

        Ok(member.profile())
    }

    #[tracing::instrument(skip(self))]
    async fn find_member(&self, user: User, id: Uuid) -> Result<Profile, Error> {
        let member = self
            .store
            .find_member(id)
            .await?
            .ok_or_else(|| not_found_error("member"))?;

        self.authorize(user, "read", member.principal())?;

        Ok(member.profile())
    }
}
