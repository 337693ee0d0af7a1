use dashmap::DashMap;
use smol_str::SmolStr;
use splitledger_application::{MemberDirectory, MemberProfile};
use splitledger_domain::MemberId;

/// In-process member directory adapter. Registrations come from whatever
/// identity source the embedding application uses; the ledger only ever
/// reads names for display.
#[derive(Default)]
pub struct StaticMemberDirectory {
    members: DashMap<MemberId, MemberProfile>,
}

impl StaticMemberDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, member_id: MemberId, name: &str, email: &str) {
        self.members.insert(
            member_id,
            MemberProfile {
                name: SmolStr::new(name),
                email: SmolStr::new(email),
            },
        );
    }
}

impl MemberDirectory for StaticMemberDirectory {
    fn resolve(&self, member_id: MemberId) -> Option<MemberProfile> {
        self.members.get(&member_id).map(|profile| profile.clone())
    }
}
