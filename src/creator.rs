//! End-to-end feed creation: resolve the listing, assemble the deployment,
//! plan the instruction stream, and drive it through the ledger.

use std::sync::Arc;

use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::config::OracleEnv;
use crate::errors::FeedResult;
use crate::jobs::assembler::{self, AssetSpec, StakePoolTemplates};
use crate::notify::{NotifyEvent, Notifier};
use crate::oracle::{InstructionBundle, OracleNetworkClient};
use crate::planner;
use crate::pools::{PoolAddresses, PoolInspector, SelectedPool};
use crate::submitter::{ensure_all_confirmed, BatchSubmitter};

/// Wired dependencies for the creation pipeline.
pub struct FeedServices {
    pub pool_inspector: Arc<dyn PoolInspector>,
    pub oracle: Arc<dyn OracleNetworkClient>,
    pub submitter: BatchSubmitter,
    pub notifier: Arc<dyn Notifier>,
    pub stake_pool_templates: Option<Arc<dyn StakePoolTemplates>>,
}

/// One listing request.
#[derive(Debug, Clone)]
pub struct FeedRequest {
    pub tier: String,
    pub asset: AssetSpec,
    pub pools: PoolAddresses,
}

/// Creates, funds, locks, and hands over one price feed. Returns the new
/// feed's address once every transaction group has confirmed.
pub async fn create_oracle_feed(
    services: &FeedServices,
    env: &OracleEnv,
    request: &FeedRequest,
) -> FeedResult<Pubkey> {
    let flow = Uuid::new_v4();
    let span = info_span!(
        "create_feed",
        %flow,
        symbol = %request.asset.base_symbol,
        tier = %request.tier,
    );
    match run_pipeline(services, env, request).instrument(span).await {
        Ok(feed) => {
            services.notifier.notify(&NotifyEvent::success(
                "Successfully created oracle",
                env.explorer_url(&feed),
            ));
            Ok(feed)
        }
        Err(err) => {
            services
                .notifier
                .notify(&NotifyEvent::error("Transaction failed", err.to_string()));
            Err(err)
        }
    }
}

async fn run_pipeline(
    services: &FeedServices,
    env: &OracleEnv,
    request: &FeedRequest,
) -> FeedResult<Pubkey> {
    // reject a bad request before any network traffic
    let pool = request.pools.select()?;
    env.tier(&request.tier)?;

    let is_reversed = match pool {
        SelectedPool::Dex { kind, address } => {
            services
                .pool_inspector
                .is_reversed(kind, address, env.quote_mint(request.asset.sol_quoted))
                .await?
        }
        // stake pools always price base-per-token
        SelectedPool::StakePool { .. } => false,
    };

    let queue = services.oracle.load_queue(env.queue).await?;
    let crank = services.oracle.load_crank(env.crank).await?;

    let payer = services.submitter.payer_pubkey();
    let deployment = assembler::assemble(
        env,
        &request.tier,
        &request.asset,
        &pool,
        is_reversed,
        &queue,
        &crank,
        payer,
        services.stake_pool_templates.as_deref(),
    )?;
    info!(
        feed_name = %deployment.name,
        pool = %pool.address(),
        jobs = deployment.jobs.len(),
        reversed = is_reversed,
        "assembled deployment"
    );

    let (feed, mut bundles) = services
        .oracle
        .create_feed_instructions(payer, &deployment)
        .await?;
    bundles.push(services.oracle.lock_feed_instruction(&feed, payer).await?);
    bundles.push(
        services
            .oracle
            .set_feed_authority_instruction(&feed, payer, env.feed_authority)
            .await?,
    );

    let (instructions, signer_pool) = flatten_bundles(bundles, &payer);
    let groups = planner::plan(&instructions, &signer_pool, &env.planner)?;
    info!(feed = %feed.pubkey, groups = groups.len(), "planned submission");

    let outcomes = services.submitter.submit(&groups).await?;
    ensure_all_confirmed(&outcomes)?;

    info!(feed = %feed.pubkey, "feed created");
    Ok(feed.pubkey)
}

/// Concatenates bundle instructions in order and pools their extra signers,
/// dropping duplicates and the fee payer.
fn flatten_bundles(
    bundles: Vec<InstructionBundle>,
    payer: &Pubkey,
) -> (Vec<Instruction>, Vec<Arc<Keypair>>) {
    let mut instructions = Vec::new();
    let mut signers: Vec<Arc<Keypair>> = Vec::new();
    for bundle in bundles {
        instructions.extend(bundle.instructions);
        for keypair in bundle.signers {
            let pubkey = keypair.pubkey();
            if pubkey == *payer || signers.iter().any(|kept| kept.pubkey() == pubkey) {
                continue;
            }
            signers.push(keypair);
        }
    }
    (instructions, signers)
}
