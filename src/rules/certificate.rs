//! Certificate rule: fitness certificate validity and time to expiry

use crate::store::Context;
use crate::types::{CertificateStatus, Trainset};

use super::RuleScore;

/// Score a trainset's fitness certificate.
///
/// - 100 when valid with more than 30 days to expiry
/// - 80 at 15–30 days, 60 at 8–14 days, 30 at 1–7 days
/// - 0 when expired, suspended, revoked, or absent
///
/// `can_induct` is true only for a positive score.
pub fn evaluate(trainset: &Trainset, ctx: &Context) -> RuleScore {
    let now = ctx.taken_at;

    let Some(cert) = ctx.certificate_for(&trainset.id) else {
        return RuleScore {
            score: 0.0,
            tag: "ABSENT",
            can_induct: false,
            warnings: vec![format!(
                "Trainset {} has no fitness certificate on record",
                trainset.number
            )],
        };
    };

    match cert.effective_status(now) {
        CertificateStatus::Valid => {}
        CertificateStatus::Expired => {
            return RuleScore {
                score: 0.0,
                tag: "EXPIRED",
                can_induct: false,
                warnings: vec![format!(
                    "Fitness certificate for {} expired on {}",
                    trainset.number,
                    cert.expires_at.format("%Y-%m-%d")
                )],
            };
        }
        CertificateStatus::Suspended => {
            return RuleScore {
                score: 0.0,
                tag: "SUSPENDED",
                can_induct: false,
                warnings: vec![format!(
                    "Fitness certificate for {} is suspended by {}",
                    trainset.number, cert.issuing_authority
                )],
            };
        }
        CertificateStatus::Revoked => {
            return RuleScore {
                score: 0.0,
                tag: "REVOKED",
                can_induct: false,
                warnings: vec![format!(
                    "Fitness certificate for {} is revoked",
                    trainset.number
                )],
            };
        }
    }

    let days = cert.days_to_expiry(now);
    let (score, tag) = if days > 30 {
        (100.0, "VALID")
    } else if days >= 15 {
        (80.0, "VALID")
    } else if days >= 8 {
        (60.0, "EXPIRING")
    } else {
        (30.0, "EXPIRING")
    };

    let warnings = if days <= 14 {
        vec![format!(
            "Fitness certificate for {} expires in {} day(s)",
            trainset.number, days
        )]
    } else {
        Vec::new()
    };

    RuleScore {
        score,
        tag,
        can_induct: true,
        warnings,
    }
}
