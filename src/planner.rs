//! Packs an ordered instruction list into submission-ready groups.
//!
//! Each group becomes one transaction: a compute budget prologue followed by
//! a bounded slice of the payload, carrying only the extra keypairs that
//! slice actually needs. Input order is preserved across group boundaries.

use std::sync::Arc;

use itertools::Itertools;
use solana_sdk::compute_budget::ComputeBudgetInstruction;
use solana_sdk::instruction::Instruction;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;

use crate::errors::{FeedError, FeedResult};

/// How the submitter may schedule a group relative to its neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    /// Must confirm before the next group is sent.
    Sequential,
    /// May be in flight alongside adjacent parallel groups.
    Parallel,
}

/// Knobs for the packing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerOptions {
    /// Payload instructions per group. One keeps every group comfortably
    /// inside per-transaction size and compute limits.
    pub max_instructions_per_group: usize,
    /// Micro-lamports written into each group's compute budget prologue.
    pub compute_unit_price: u64,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            max_instructions_per_group: 1,
            compute_unit_price: 80_000,
        }
    }
}

/// One planned transaction.
#[derive(Clone)]
pub struct TransactionGroup {
    pub prologue: Instruction,
    pub payload: Vec<Instruction>,
    /// Extra signers beyond the fee payer.
    pub signers: Vec<Arc<Keypair>>,
    pub sequence: SequenceKind,
}

impl TransactionGroup {
    /// Full instruction list in wire order.
    pub fn instructions(&self) -> Vec<Instruction> {
        std::iter::once(self.prologue.clone())
            .chain(self.payload.iter().cloned())
            .collect()
    }
}

/// Splits `instructions` into groups of at most
/// `options.max_instructions_per_group`, prefixing each with a compute
/// budget prologue and attaching the minimal signer subset from
/// `signer_pool`. The fee payer signs every transaction and must not be in
/// the pool.
pub fn plan(
    instructions: &[Instruction],
    signer_pool: &[Arc<Keypair>],
    options: &PlannerOptions,
) -> FeedResult<Vec<TransactionGroup>> {
    if options.max_instructions_per_group == 0 {
        return Err(FeedError::configuration(
            "planner requires at least one instruction per group",
        ));
    }
    let prologue = ComputeBudgetInstruction::set_compute_unit_price(options.compute_unit_price);

    let mut groups = Vec::new();
    for chunk in &instructions
        .iter()
        .chunks(options.max_instructions_per_group)
    {
        let payload: Vec<Instruction> = chunk.cloned().collect();
        let signers = minimal_signers(&payload, signer_pool);
        groups.push(TransactionGroup {
            prologue: prologue.clone(),
            payload,
            signers,
            sequence: SequenceKind::Sequential,
        });
    }
    Ok(groups)
}

/// Pool keypairs some payload instruction marks as a signer, deduplicated
/// by pubkey, in pool order.
fn minimal_signers(payload: &[Instruction], pool: &[Arc<Keypair>]) -> Vec<Arc<Keypair>> {
    let mut signers: Vec<Arc<Keypair>> = Vec::new();
    for keypair in pool {
        let pubkey = keypair.pubkey();
        if signers.iter().any(|kept| kept.pubkey() == pubkey) {
            continue;
        }
        let needed = payload.iter().any(|ix| {
            ix.accounts
                .iter()
                .any(|meta| meta.is_signer && meta.pubkey == pubkey)
        });
        if needed {
            signers.push(Arc::clone(keypair));
        }
    }
    signers
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::instruction::AccountMeta;
    use solana_sdk::pubkey::Pubkey;

    fn marker_ix(marker: u8, signers: &[Pubkey]) -> Instruction {
        let accounts = signers
            .iter()
            .map(|pubkey| AccountMeta::new_readonly(*pubkey, true))
            .collect();
        Instruction::new_with_bytes(Pubkey::new_unique(), &[marker], accounts)
    }

    fn markers(groups: &[TransactionGroup]) -> Vec<u8> {
        groups
            .iter()
            .flat_map(|group| group.payload.iter().map(|ix| ix.data[0]))
            .collect()
    }

    #[test]
    fn test_default_bound_plans_one_instruction_per_group() {
        let instructions: Vec<Instruction> =
            (0..5).map(|marker| marker_ix(marker, &[])).collect();

        let groups = plan(&instructions, &[], &PlannerOptions::default()).unwrap();

        assert_eq!(groups.len(), 5);
        assert!(groups.iter().all(|group| group.payload.len() == 1));
        assert_eq!(markers(&groups), vec![0, 1, 2, 3, 4]);
        assert!(groups
            .iter()
            .all(|group| group.sequence == SequenceKind::Sequential));
    }

    #[test]
    fn test_wider_bound_packs_in_order() {
        let instructions: Vec<Instruction> =
            (0..5).map(|marker| marker_ix(marker, &[])).collect();
        let options = PlannerOptions {
            max_instructions_per_group: 2,
            ..PlannerOptions::default()
        };

        let groups = plan(&instructions, &[], &options).unwrap();

        let sizes: Vec<usize> = groups.iter().map(|group| group.payload.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(markers(&groups), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_zero_bound_is_rejected() {
        let options = PlannerOptions {
            max_instructions_per_group: 0,
            ..PlannerOptions::default()
        };
        assert!(plan(&[], &[], &options).is_err());
    }

    #[test]
    fn test_empty_input_plans_no_groups() {
        let groups = plan(&[], &[], &PlannerOptions::default()).unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn test_prologue_carries_the_configured_price() {
        let options = PlannerOptions {
            compute_unit_price: 999,
            ..PlannerOptions::default()
        };
        let groups = plan(&[marker_ix(7, &[])], &[], &options).unwrap();

        assert_eq!(
            groups[0].prologue,
            ComputeBudgetInstruction::set_compute_unit_price(999)
        );
        let wire = groups[0].instructions();
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0], groups[0].prologue);
        assert_eq!(wire[1].data[0], 7);
    }

    #[test]
    fn test_each_group_carries_only_the_signers_it_needs() {
        let feed_keypair = Keypair::new();
        let lease_keypair = Keypair::new();
        let job_keypair = Keypair::new();
        let pool = vec![
            Arc::new(feed_keypair),
            Arc::new(lease_keypair),
            Arc::new(job_keypair),
        ];
        let instructions = vec![
            marker_ix(0, &[pool[0].pubkey()]),
            marker_ix(1, &[pool[1].pubkey(), pool[2].pubkey()]),
            marker_ix(2, &[]),
        ];

        let groups = plan(&instructions, &pool, &PlannerOptions::default()).unwrap();

        let pubkeys: Vec<Vec<Pubkey>> = groups
            .iter()
            .map(|group| group.signers.iter().map(|kp| kp.pubkey()).collect())
            .collect();
        assert_eq!(pubkeys[0], vec![pool[0].pubkey()]);
        assert_eq!(pubkeys[1], vec![pool[1].pubkey(), pool[2].pubkey()]);
        assert!(pubkeys[2].is_empty());
    }

    #[test]
    fn test_duplicate_pool_entries_collapse() {
        let keypair = Arc::new(Keypair::new());
        let pool = vec![Arc::clone(&keypair), Arc::clone(&keypair)];
        let instructions = vec![marker_ix(0, &[keypair.pubkey()])];

        let groups = plan(&instructions, &pool, &PlannerOptions::default()).unwrap();

        assert_eq!(groups[0].signers.len(), 1);
    }

    // Exhaustive over every signer-need pattern of three instructions
    // against a pool of two keypairs, at every bound that matters.
    #[test]
    fn test_signer_selection_matches_need_exactly_at_any_bound() {
        let pool: Vec<Arc<Keypair>> = (0..2).map(|_| Arc::new(Keypair::new())).collect();

        for pattern in 0..(1 << 6) {
            let instructions: Vec<Instruction> = (0..3)
                .map(|ix_index| {
                    let mut needed: Vec<Pubkey> = Vec::new();
                    for (pool_index, keypair) in pool.iter().enumerate() {
                        if pattern & (1 << (ix_index * 2 + pool_index)) != 0 {
                            needed.push(keypair.pubkey());
                        }
                    }
                    marker_ix(ix_index as u8, &needed)
                })
                .collect();

            for bound in 1..=3 {
                let options = PlannerOptions {
                    max_instructions_per_group: bound,
                    ..PlannerOptions::default()
                };
                let groups = plan(&instructions, &pool, &options).unwrap();

                assert_eq!(markers(&groups), vec![0, 1, 2], "pattern {pattern}");
                for group in &groups {
                    for keypair in &pool {
                        let needed = group.payload.iter().any(|ix| {
                            ix.accounts
                                .iter()
                                .any(|meta| meta.is_signer && meta.pubkey == keypair.pubkey())
                        });
                        let carried = group
                            .signers
                            .iter()
                            .any(|kp| kp.pubkey() == keypair.pubkey());
                        assert_eq!(
                            needed, carried,
                            "pattern {pattern} bound {bound}"
                        );
                    }
                }
            }
        }
    }
}
