//! # Hop Arithmetic
//!
//! A virtual app is backed by one app copy per hop channel. Within a hop,
//! the member closer to the initiator (L) stands in for the initiator and
//! the other (R) for the responder:
//!
//! ```text
//!   A ──────── B ──────── C
//!   L=A  R=B   L=B  R=C
//!   {A: i, B: r}  {B: i, C: r}      i = initiatorDeposit, r = responderDeposit
//! ```

use super::errors::RouterError;
use shared_types::{AppInstanceProposal, Balances, PeerIdentity, VirtualRoute};

/// Route of a virtual proposal, validated.
pub fn checked_route(proposal: &AppInstanceProposal) -> Result<VirtualRoute, RouterError> {
    let route = proposal.route();
    route.validate().map_err(RouterError::InvalidRoute)?;
    Ok(route)
}

/// Collateral committed at the hop between `a` and `b`.
pub fn hop_balances(
    route: &VirtualRoute,
    proposal: &AppInstanceProposal,
    a: &PeerIdentity,
    b: &PeerIdentity,
) -> Result<Balances, RouterError> {
    let (left, right) = oriented(route, a, b, &proposal.app_instance_id.to_string())?;
    let mut balances = Balances::new();
    balances.insert(left.clone(), proposal.initiator_deposit);
    balances.insert(right.clone(), proposal.responder_deposit);
    Ok(balances)
}

/// Collateral released at the hop between `a` and `b`.
///
/// `final_balances` is keyed by the two end parties. `None` is a refund:
/// the hop gets back exactly what it committed.
pub fn release_balances(
    route: &VirtualRoute,
    committed: &Balances,
    final_balances: Option<&Balances>,
    a: &PeerIdentity,
    b: &PeerIdentity,
    app: &str,
) -> Result<Balances, RouterError> {
    let Some(final_balances) = final_balances else {
        return Ok(committed.clone());
    };
    let (left, right) = oriented(route, a, b, app)?;
    let amount_of = |end: &PeerIdentity| {
        final_balances.get(end).copied().ok_or_else(|| {
            RouterError::InvalidRoute(format!("final balances do not name {end}"))
        })
    };
    let mut balances = Balances::new();
    balances.insert(left.clone(), amount_of(route.initiator())?);
    balances.insert(right.clone(), amount_of(route.responder())?);
    Ok(balances)
}

fn oriented<'a>(
    route: &VirtualRoute,
    a: &'a PeerIdentity,
    b: &'a PeerIdentity,
    app: &str,
) -> Result<(&'a PeerIdentity, &'a PeerIdentity), RouterError> {
    if !route.adjacent(a, b) {
        return Err(RouterError::InvalidRoute(format!(
            "{a} and {b} are not adjacent on the route of {app}"
        )));
    }
    route.orient(a, b).ok_or_else(|| RouterError::NotOnRoute {
        peer: a.clone(),
        app: app.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::{Address, Amount, AppIdentity, AppInstanceId};

    fn peer(s: &str) -> PeerIdentity {
        PeerIdentity::new(s)
    }

    fn proposal(intermediaries: &[&str]) -> AppInstanceProposal {
        AppInstanceProposal {
            app_instance_id: AppInstanceId::new("v1"),
            app: AppIdentity {
                definition: Address::zero(),
                state_encoding: String::new(),
                action_encoding: None,
            },
            initial_state: json!({}),
            initiator: peer("a"),
            responder: peer("c"),
            initiator_deposit: Amount::from(4),
            responder_deposit: Amount::from(1),
            timeout: 0,
            intermediaries: intermediaries.iter().map(|p| peer(p)).collect(),
        }
    }

    #[test]
    fn test_route_needs_intermediary() {
        assert!(checked_route(&proposal(&[])).is_err());
        assert!(checked_route(&proposal(&["a"])).is_err());
        assert!(checked_route(&proposal(&["b"])).is_ok());
    }

    #[test]
    fn test_hop_balances_follow_route_order() {
        let p = proposal(&["b"]);
        let route = p.route();

        let first = hop_balances(&route, &p, &peer("b"), &peer("a")).unwrap();
        assert_eq!(first[&peer("a")], Amount::from(4));
        assert_eq!(first[&peer("b")], Amount::from(1));

        let second = hop_balances(&route, &p, &peer("b"), &peer("c")).unwrap();
        assert_eq!(second[&peer("b")], Amount::from(4));
        assert_eq!(second[&peer("c")], Amount::from(1));
    }

    #[test]
    fn test_non_adjacent_hop_rejected() {
        let p = proposal(&["b"]);
        let err = hop_balances(&p.route(), &p, &peer("a"), &peer("c")).unwrap_err();
        assert!(matches!(err, RouterError::InvalidRoute(_)));
    }

    #[test]
    fn test_release_maps_ends_onto_hop() {
        let p = proposal(&["b"]);
        let route = p.route();
        let committed = hop_balances(&route, &p, &peer("b"), &peer("c")).unwrap();

        let mut ends = Balances::new();
        ends.insert(peer("a"), Amount::from(0));
        ends.insert(peer("c"), Amount::from(5));
        let released =
            release_balances(&route, &committed, Some(&ends), &peer("c"), &peer("b"), "v1")
                .unwrap();
        assert_eq!(released[&peer("b")], Amount::from(0));
        assert_eq!(released[&peer("c")], Amount::from(5));

        let refund = release_balances(&route, &committed, None, &peer("b"), &peer("c"), "v1")
            .unwrap();
        assert_eq!(refund, committed);
    }
}
