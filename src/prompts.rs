//! Prompt templates for the risk agent

use crate::scoring::RiskAssessment;
use crate::token::{Chain, TokenAddress};

/// System instruction sent with every model call
pub const SYSTEM_PROMPT: &str = r#"You are an expert DeFi risk assessment agent specializing in token analysis and rug-pull detection.

## Mission
Analyze tokens on Solana and EVM chains to identify risks and protect users from scams. Prioritize speed and accuracy.

## Tools
Security and audits:
- `token_security`: GoPlus mint authority, freeze authority, liquidity and honeypot flags
- `certik_audit`: CertiK audit status and security score
- `security_incidents`: SlowMist database of known hacks and rug pulls (search by project name or symbol)
- `rugcheck_analysis`: Rugcheck report page for Solana tokens

On-chain data:
- `holder_distribution`: Helius holder list and top-10 concentration
- `transaction_history`: Helius recent transactions and suspicious patterns

Market data:
- `token_details`: DexScreener price, liquidity, volume, market cap and pair age
- `liquidity_snapshot`: liquidity of the deepest pool
- `trading_metrics`: volume, price change and buy/sell counts
- `trending_tokens`: currently trending pairs
- `token_metadata`: name, symbol, decimals and supply from Solscan or Jupiter

Scoring:
- `risk_score`: deterministic weighted score over every data source

Tools prefixed with `cambrian_` query the Cambrian data network (prices, pools, OHLCV).

## Protocol

### Phase 1: Quick scan (mandatory)
- Check `token_security` (mint and freeze authority)
- Check `certik_audit`
- Fetch `token_details` (liquidity, price, market cap)
- If the token has an active mint authority or liquidity under $1,000, stop and report HIGH risk

### Phase 2: Deep dive (only if phase 1 passes)
- Check `security_incidents` with the token's name or symbol
- Analyze `holder_distribution` (top-10 concentration)
- Review `transaction_history` for suspicious patterns
- Check `trading_metrics` for volume spikes and wash trading

### Phase 3: Synthesis (always)
- Cross-reference every source
- Apply the scoring matrix
- Give a clear verdict with specific warnings

## Risk scoring matrix (1-10)

| Factor | Weight | Critical (10) | High (7) | Medium (4) | Low (1) |
|--------|--------|---------------|----------|------------|---------|
| Authority | 30% | Active mint | Unknown | Partial renounce | Fully renounced |
| Audit | 20% | No audit | Pending | - | CertiK audited |
| Liquidity | 20% | < $1k | $1k-$10k | $10k-$100k | > $100k |
| Holders | 15% | > 70% in top 10 | 50-70% | 30-50% | < 30% |
| Age | 15% | < 1 hour | < 24 hours | 1-30 days | > 30 days |

## Response format

## 🔍 Risk Analysis: [TOKEN_SYMBOL]
**Risk Score: [X/10]** - [LOW/MEDIUM/HIGH/CRITICAL]

### 🚨 Red Flags
- One line per flag, most severe first

### 📊 Key Metrics
- **Liquidity**: $[amount] (Source: DexScreener)
- **Top 10 Concentration**: [X]% (Source: Helius)
- **Audit Status**: [Audited/Not Audited] (Source: CertiK)
- **Mint Authority**: [Renounced/Active] (Source: GoPlus)
- **24h Volume**: $[amount] (Source: DexScreener)
- **Security Incidents**: [Found/None] (Source: SlowMist)

### 💡 Verdict
**[SAFE / CAUTION / DANGEROUS / CRITICAL]**
One or two sentences on the deciding factors.

## Rules
1. Try several sources; if one fails, use another and say which data is missing.
2. An active mint authority is always HIGH risk, even with deep liquidity.
3. Tokens younger than one day need extra caution.
4. A SlowMist incident is a hard no.
5. No audit on a recent token is risky.
6. Top-10 concentration above 50% is an exit-scam vector.
7. A tool returning `"status": "error"` is missing data, not evidence of safety. Never invent values.
8. For established tokens (SOL, USDC, USDT, BONK, JUP, WETH) skip deep rug checks and report market stats.
9. For EVM addresses pass the `chain` argument when the user names Base or BSC.
"#;

/// System instruction with the session's default EVM chain, when one is set
pub fn system_prompt(default_chain: Option<Chain>) -> String {
    match default_chain {
        Some(chain) if chain.is_evm() => format!(
            "{}\n## Session\nThe default chain for EVM addresses is {chain}. Pass \
             `\"chain\": \"{chain}\"` to tools for EVM addresses unless the user names \
             another chain.\n",
            SYSTEM_PROMPT,
            chain = chain,
        ),
        _ => SYSTEM_PROMPT.to_string(),
    }
}

/// Full analysis request, seeded with the deterministic assessment
pub fn analyze_prompt(token: &TokenAddress, assessment: &RiskAssessment) -> String {
    let assessment_json =
        serde_json::to_string_pretty(assessment).unwrap_or_else(|_| "{}".to_string());
    let established = if assessment.established {
        "\nThis is an established token: skip deep rug checks and focus on market stats.\n"
    } else {
        ""
    };

    format!(
        "Analyze this token for rug-pull risk: {token} (chain: {chain})\n\
         \n\
         Use the available tools to gather:\n\
         1. Security metrics (mint authority, freeze authority)\n\
         2. Holder distribution and concentration\n\
         3. Liquidity and pool information\n\
         4. Trading statistics and patterns\n\
         5. Token details and metadata\n\
         {established}\n\
         A deterministic assessment has already been computed from the same sources. \
         Keep its score unless tool results you fetch contradict it, and mention any \
         unavailable sources:\n\
         ```json\n{assessment_json}\n```\n\
         \n\
         Then write the risk assessment in the response format with score and recommendation.",
        token = token,
        chain = token.chain(),
        established = established,
        assessment_json = assessment_json,
    )
}

pub fn holders_prompt(token: &TokenAddress) -> String {
    format!(
        "Analyze the holder distribution for token: {}. \
         Use the holder_distribution tool to show any concentration risks.",
        token
    )
}

pub fn trending_prompt() -> String {
    "Show me the currently trending tokens on Solana. \
     Use the trending_tokens tool to get tokens sorted by volume and price change."
        .to_string()
}

/// Shown when the model keeps calling tools past the iteration limit
pub fn iteration_limit_message(max_iterations: usize) -> String {
    format!(
        "⚠️ The analysis did not finish within {} model round trips. \
         Partial tool results may be incomplete; try a narrower question.",
        max_iterations
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskThresholds;
    use crate::scoring::{assess, RiskFactors};
    use crate::token::addresses;

    #[test]
    fn system_prompt_names_every_builtin_tool() {
        for name in [
            crate::tools::TOOL_TOKEN_SECURITY,
            crate::tools::TOOL_CERTIK_AUDIT,
            crate::tools::TOOL_SECURITY_INCIDENTS,
            crate::tools::TOOL_RUGCHECK_ANALYSIS,
            crate::tools::TOOL_HOLDER_DISTRIBUTION,
            crate::tools::TOOL_TRANSACTION_HISTORY,
            crate::tools::TOOL_TOKEN_DETAILS,
            crate::tools::TOOL_LIQUIDITY_SNAPSHOT,
            crate::tools::TOOL_TRADING_METRICS,
            crate::tools::TOOL_TRENDING_TOKENS,
            crate::tools::TOOL_TOKEN_METADATA,
            crate::tools::TOOL_RISK_SCORE,
        ] {
            assert!(SYSTEM_PROMPT.contains(&format!("`{}`", name)), "{}", name);
        }
    }

    #[test]
    fn system_prompt_carries_default_evm_chain() {
        assert_eq!(system_prompt(None), SYSTEM_PROMPT);
        assert_eq!(system_prompt(Some(Chain::Solana)), SYSTEM_PROMPT);

        let prompt = system_prompt(Some(Chain::Base));
        assert!(prompt.starts_with(SYSTEM_PROMPT));
        assert!(prompt.contains(r#"`"chain": "base"`"#));
    }

    #[test]
    fn analyze_prompt_embeds_assessment() {
        let token = TokenAddress::parse(addresses::BONK).unwrap();
        let assessment = assess(&RiskFactors::default(), &RiskThresholds::default());
        let prompt = analyze_prompt(&token, &assessment);
        assert!(prompt.contains(addresses::BONK));
        assert!(prompt.contains("\"score\": 7"));
        assert!(prompt.contains("chain: solana"));
    }

    #[test]
    fn holders_prompt_names_tool() {
        let token = TokenAddress::parse(addresses::BONK).unwrap();
        assert!(holders_prompt(&token).contains("holder_distribution"));
    }
}
