//! Per-pharmacy index from users to memberships and from memberships to
//! display fields.

use crate::types::model::fallback_member_name;
use crate::types::{Member, MembershipId, PharmacyId, Room, UserId};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MembershipIndex {
    /// pharmacy -> user -> membership
    by_pharmacy: HashMap<PharmacyId, HashMap<UserId, MembershipId>>,
    members: HashMap<MembershipId, Member>,
}

impl MembershipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_populated(&self, pharmacy: PharmacyId) -> bool {
        self.by_pharmacy.contains_key(&pharmacy)
    }

    /// Index a pharmacy's members. Populated once: returns `false` and leaves
    /// the index untouched when the pharmacy was already indexed.
    pub fn populate(&mut self, pharmacy: PharmacyId, members: Vec<Member>) -> bool {
        if self.is_populated(pharmacy) {
            return false;
        }

        let users = self.by_pharmacy.entry(pharmacy).or_default();
        for member in members {
            users.insert(member.user_id, member.membership_id);
            self.members.insert(member.membership_id, member);
        }
        true
    }

    pub fn membership_for_user(&self, pharmacy: PharmacyId, user: UserId) -> Option<MembershipId> {
        self.by_pharmacy
            .get(&pharmacy)
            .and_then(|users| users.get(&user))
            .copied()
    }

    pub fn member(&self, membership: MembershipId) -> Option<&Member> {
        self.members.get(&membership)
    }

    pub fn display_name(&self, membership: MembershipId) -> String {
        self.member(membership)
            .map(Member::display_name)
            .unwrap_or_else(|| fallback_member_name(membership))
    }

    /// The other participant of a direct room, seen from `me`.
    pub fn direct_partner(&self, room: &Room, me: UserId) -> Option<&Member> {
        if !room.is_direct() {
            return None;
        }
        let mine = room
            .pharmacy
            .and_then(|pharmacy| self.membership_for_user(pharmacy, me));

        room.participant_ids
            .iter()
            .copied()
            .filter(|id| Some(*id) != mine)
            .filter_map(|id| self.member(id))
            .find(|member| member.user_id != me)
    }

    /// Fill in an empty direct-room title with the partner's name.
    pub fn resolve_title(&self, room: &mut Room, me: UserId) {
        if !room.title.trim().is_empty() {
            return;
        }
        if let Some(partner) = self.direct_partner(room, me) {
            room.title = partner.display_name();
        }
    }
}
