//! Lending and borrowing.
//!
//! ## Eligibility
//!
//! - Agents past their fertility window may lend half their sugar.
//! - Fertile agents may lend only the surplus above their reproduction
//!   threshold plus one tick of metabolism.
//! - Fertile agents below their threshold want to borrow the shortfall.
//! - Agents that have not reached their fertility window do neither.
//!
//! ## Loan lifecycle
//!
//! A loan moves its principal from lender to borrower immediately and is
//! written into both agents' books with `time_due = now + duration`. When
//! the due date arrives the borrower owes `amount * (1 + interest_rate)`.
//! If it can cover that, it pays and the loan closes. Otherwise it pays half
//! its wealth and the unpaid remainder is reissued as a new loan.
//!
//! When a lender dies its claims pass to its first living child, or are
//! forgiven if it has none. When a borrower dies its debts are extinguished.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use sugarscape_ledger::FlowKind;
use sugarscape_types::{AgentId, AgentState, Loan};

use crate::counters::bump;
use crate::error::{AgentError, overflow};
use crate::society::Society;

/// Who an agent may deal with when extending credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditPartners {
    /// Every agent within vision, in neighbour order.
    Neighbours,
    /// A single named counterparty, which must be within vision.
    Only(AgentId),
}

/// A loan made during credit resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuedLoan {
    /// The agent that lent.
    pub lender: AgentId,
    /// The agent that borrowed.
    pub borrower: AgentId,
    /// Principal transferred.
    pub amount: Decimal,
    /// Tick the loan falls due.
    pub time_due: u64,
}

/// Result of a borrower's repayment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepaymentSummary {
    /// Loans paid in full.
    pub repaid: u32,
    /// Loans partly paid and reissued.
    pub rolled_over: u32,
    /// Total sugar paid to lenders.
    pub paid: Decimal,
}

/// What happened to a dying agent's loan books.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoanCleanup {
    /// Claims reassigned to an heir.
    pub inherited: u32,
    /// Claims cancelled because no heir could take them.
    pub forgiven: u32,
    /// Debts cancelled because the borrower died.
    pub extinguished: u32,
}

/// Sugar the agent may lend right now.
///
/// # Errors
///
/// Returns [`AgentError::ArithmeticOverflow`].
pub fn lendable_amount(agent: &AgentState) -> Result<Decimal, AgentError> {
    if agent.sugar <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    if agent.is_past_fertility() {
        return agent
            .sugar
            .checked_div(Decimal::TWO)
            .ok_or_else(|| overflow("halving lender wealth"));
    }
    if agent.is_fertile() {
        let reserved = agent
            .initial_sugar
            .checked_add(agent.metabolism)
            .ok_or_else(|| overflow("lender reserve"))?;
        let surplus = agent
            .sugar
            .checked_sub(reserved)
            .ok_or_else(|| overflow("lender surplus"))?;
        return Ok(surplus.max(Decimal::ZERO));
    }
    Ok(Decimal::ZERO)
}

/// Whether the agent has sugar to lend.
pub fn can_lend(agent: &AgentState) -> bool {
    lendable_amount(agent).is_ok_and(|amount| amount > Decimal::ZERO)
}

/// Sugar the agent wants to borrow to reach its reproduction threshold.
///
/// # Errors
///
/// Returns [`AgentError::ArithmeticOverflow`].
pub fn borrow_need(agent: &AgentState) -> Result<Decimal, AgentError> {
    if !agent.is_fertile() || agent.sugar >= agent.initial_sugar {
        return Ok(Decimal::ZERO);
    }
    agent
        .initial_sugar
        .checked_sub(agent.sugar)
        .ok_or_else(|| overflow("borrow need"))
}

/// Whether the agent wants to borrow.
pub fn will_borrow(agent: &AgentState) -> bool {
    borrow_need(agent).is_ok_and(|need| need > Decimal::ZERO)
}

/// Write a loan into both agents' books.
fn book_loan(
    society: &mut Society,
    lender: AgentId,
    borrower: AgentId,
    loan: Loan,
) -> Result<(), AgentError> {
    society
        .agent_mut(lender)?
        .loans_given
        .entry(borrower)
        .or_default()
        .push(loan);
    society
        .agent_mut(borrower)?
        .loans_owed
        .entry(lender)
        .or_default()
        .push(loan);
    Ok(())
}

/// Remove the first copy of `loan` from a book, dropping empty entries.
fn strike(book: &mut BTreeMap<AgentId, Vec<Loan>>, key: AgentId, loan: Loan) {
    if let Some(loans) = book.get_mut(&key) {
        if let Some(index) = loans.iter().position(|l| *l == loan) {
            loans.remove(index);
        }
        if loans.is_empty() {
            book.remove(&key);
        }
    }
}

/// Erase a loan from both agents' books. Missing agents are skipped.
fn unbook_loan(society: &mut Society, lender: AgentId, borrower: AgentId, loan: Loan) {
    if let Some(agent) = society.population.get_mut(lender) {
        strike(&mut agent.loans_given, borrower, loan);
    }
    if let Some(agent) = society.population.get_mut(borrower) {
        strike(&mut agent.loans_owed, lender, loan);
    }
}

fn due_date(society: &Society) -> u64 {
    society.tick.saturating_add(society.config.loan_duration)
}

/// Transfer `amount` from lender to borrower and record the loan.
///
/// # Errors
///
/// Returns [`AgentError::AgentNotFound`] or a ledger error.
pub fn make_loan(
    society: &mut Society,
    lender: AgentId,
    borrower: AgentId,
    amount: Decimal,
) -> Result<IssuedLoan, AgentError> {
    let loan = Loan {
        amount,
        time_due: due_date(society),
    };
    society.transfer(FlowKind::Loan, lender, borrower, amount)?;
    book_loan(society, lender, borrower, loan)?;
    bump(&mut society.counters.loans_issued);
    debug!(
        tick = society.tick,
        %lender,
        %borrower,
        %amount,
        time_due = loan.time_due,
        "Loan issued"
    );
    Ok(IssuedLoan {
        lender,
        borrower,
        amount,
        time_due: loan.time_due,
    })
}

/// Settle every loan the borrower has that is due this tick.
///
/// # Errors
///
/// Returns [`AgentError`] on inconsistent state or overflow.
pub fn attempt_pay_loans(
    society: &mut Society,
    borrower: AgentId,
) -> Result<RepaymentSummary, AgentError> {
    let tick = society.tick;
    let due: Vec<(AgentId, Loan)> = society
        .agent(borrower)?
        .loans_owed
        .iter()
        .flat_map(|(lender, loans)| loans.iter().map(move |loan| (*lender, *loan)))
        .filter(|(_, loan)| loan.time_due <= tick)
        .collect();

    let multiplier = Decimal::ONE
        .checked_add(society.config.interest_rate)
        .ok_or_else(|| overflow("interest multiplier"))?;
    let mut summary = RepaymentSummary::default();

    for (lender, loan) in due {
        if !society.is_alive(lender) {
            unbook_loan(society, lender, borrower, loan);
            continue;
        }
        let owed = loan
            .amount
            .checked_mul(multiplier)
            .ok_or_else(|| overflow("loan repayment"))?;
        let wealth = society.agent(borrower)?.sugar;

        if wealth >= owed {
            society.transfer(FlowKind::Repayment, borrower, lender, owed)?;
            unbook_loan(society, lender, borrower, loan);
            bump(&mut society.counters.loans_repaid);
            summary.repaid = summary.repaid.saturating_add(1);
            summary.paid = summary
                .paid
                .checked_add(owed)
                .ok_or_else(|| overflow("repayment total"))?;
            debug!(tick, %lender, %borrower, %owed, "Loan repaid");
        } else {
            let payment = if wealth > Decimal::ZERO {
                wealth
                    .checked_div(Decimal::TWO)
                    .ok_or_else(|| overflow("partial repayment"))?
            } else {
                Decimal::ZERO
            };
            society.transfer(FlowKind::Repayment, borrower, lender, payment)?;
            let remainder = owed
                .checked_sub(payment)
                .ok_or_else(|| overflow("rolled-over principal"))?;
            unbook_loan(society, lender, borrower, loan);
            let renewed = Loan {
                amount: remainder,
                time_due: due_date(society),
            };
            book_loan(society, lender, borrower, renewed)?;
            bump(&mut society.counters.loans_rolled_over);
            summary.rolled_over = summary.rolled_over.saturating_add(1);
            summary.paid = summary
                .paid
                .checked_add(payment)
                .ok_or_else(|| overflow("repayment total"))?;
            debug!(
                tick,
                %lender,
                %borrower,
                %payment,
                %remainder,
                time_due = renewed.time_due,
                "Loan rolled over"
            );
        }
    }
    Ok(summary)
}

/// Resolve a dying agent's loan books.
///
/// Claims it holds as lender go to `heir` (the first living child) with
/// amount and due date unchanged, or are forgiven. Debts it owes are
/// extinguished. No sugar moves.
///
/// # Errors
///
/// Returns [`AgentError::AgentNotFound`] if `dying` is not alive.
pub fn clear_loans_on_death(
    society: &mut Society,
    dying: AgentId,
    heir: Option<AgentId>,
) -> Result<LoanCleanup, AgentError> {
    let agent = society.agent_mut(dying)?;
    let given = std::mem::take(&mut agent.loans_given);
    let owed = std::mem::take(&mut agent.loans_owed);
    let mut cleanup = LoanCleanup::default();

    for (borrower, loans) in given {
        let count = u32::try_from(loans.len()).unwrap_or(u32::MAX);
        let borrower_alive = match society.population.get_mut(borrower) {
            Some(state) => {
                state.loans_owed.remove(&dying);
                true
            }
            None => false,
        };
        match heir {
            Some(heir) if borrower_alive && heir != borrower && society.is_alive(heir) => {
                for loan in loans {
                    book_loan(society, heir, borrower, loan)?;
                }
                society.counters.loans_inherited =
                    society.counters.loans_inherited.saturating_add(u64::from(count));
                cleanup.inherited = cleanup.inherited.saturating_add(count);
                debug!(tick = society.tick, %dying, %heir, %borrower, count, "Loans inherited");
            }
            _ => {
                society.counters.loans_forgiven =
                    society.counters.loans_forgiven.saturating_add(u64::from(count));
                cleanup.forgiven = cleanup.forgiven.saturating_add(count);
                debug!(tick = society.tick, %dying, %borrower, count, "Loans forgiven");
            }
        }
    }

    for (lender, loans) in owed {
        let count = u32::try_from(loans.len()).unwrap_or(u32::MAX);
        if let Some(state) = society.population.get_mut(lender) {
            state.loans_given.remove(&dying);
        }
        society.counters.debts_extinguished = society
            .counters
            .debts_extinguished
            .saturating_add(u64::from(count));
        cleanup.extinguished = cleanup.extinguished.saturating_add(count);
    }

    Ok(cleanup)
}

/// Counterparties the agent may deal with, in neighbour order.
fn counterparties(
    society: &Society,
    id: AgentId,
    partners: CreditPartners,
) -> Result<Vec<AgentId>, AgentError> {
    let agent = society.agent(id)?;
    let visible: Vec<AgentId> = society
        .grid
        .agents_in_vision(agent.position, agent.vision)
        .into_iter()
        .map(|(other, _, _)| other)
        .collect();
    Ok(match partners {
        CreditPartners::Neighbours => visible,
        CreditPartners::Only(partner) => visible.into_iter().filter(|o| *o == partner).collect(),
    })
}

/// Issue new loans for one agent.
///
/// An agent with sugar to lend lends `min(available, need)` to each
/// willing borrower in turn until it runs out. Otherwise, if it wants to
/// borrow, it borrows from each willing lender in turn until its need is
/// met.
///
/// # Errors
///
/// Returns [`AgentError`] on inconsistent state or overflow.
pub fn extend_credit(
    society: &mut Society,
    id: AgentId,
    partners: CreditPartners,
) -> Result<Vec<IssuedLoan>, AgentError> {
    let candidates = counterparties(society, id, partners)?;
    let mut issued = Vec::new();

    let mut available = lendable_amount(society.agent(id)?)?;
    if available > Decimal::ZERO {
        for borrower in candidates {
            if available <= Decimal::ZERO {
                break;
            }
            let need = borrow_need(society.agent(borrower)?)?;
            if need <= Decimal::ZERO {
                continue;
            }
            let amount = available.min(need);
            issued.push(make_loan(society, id, borrower, amount)?);
            available = available
                .checked_sub(amount)
                .ok_or_else(|| overflow("lender balance"))?;
        }
        return Ok(issued);
    }

    let mut need = borrow_need(society.agent(id)?)?;
    for lender in candidates {
        if need <= Decimal::ZERO {
            break;
        }
        let offer = lendable_amount(society.agent(lender)?)?;
        if offer <= Decimal::ZERO {
            continue;
        }
        let amount = offer.min(need);
        issued.push(make_loan(society, lender, id, amount)?);
        need = need
            .checked_sub(amount)
            .ok_or_else(|| overflow("borrower need"))?;
    }
    Ok(issued)
}
