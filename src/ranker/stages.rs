//! Steppable execution stages
//!
//! One stage per plan node kind. A call to `work` does a bounded unit of
//! work and reports whether a result is ready. Stages do not hold
//! references to the collection between calls; it is passed to every
//! `work`, so a trial can revalidate the catalog between steps.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::Value;

use crate::catalog::{Collection, IndexKeyEntry, RecordId};
use crate::expression::{compare_values, MatchExpression};
use crate::index::{IndexBounds, SortDirection, SortPattern};
use crate::planner::{PlannerError, PlannerResult};
use crate::query::Projection;
use crate::solution::{ProjectionKind, QuerySolutionNode, Stage};

use super::working_set::{WorkingSet, WorkingSetId, WorkingSetMember};

/// Outcome of one unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// A result is ready in the working set
    Advanced(WorkingSetId),
    /// Work was done but no result is ready yet
    NeedTime,
    IsEof,
}

/// An executable stage
pub trait PlanStage {
    fn work(&mut self, ws: &mut WorkingSet, collection: &Collection) -> PlannerResult<StageState>;
}

/// Builds the stage tree for a plan
pub fn build_stage(node: &QuerySolutionNode) -> Box<dyn PlanStage> {
    let children: Vec<Box<dyn PlanStage>> = node.children.iter().map(build_stage).collect();
    let filter = node.filter.clone();

    match &node.stage {
        Stage::CollectionScan { direction } => Box::new(CollectionScanStage {
            direction: *direction,
            position: 0,
            filter,
        }),
        Stage::IndexScan {
            index,
            bounds,
            direction,
        } => Box::new(IndexScanStage {
            index_name: index.name.clone(),
            fields: index.key_pattern.fields().map(str::to_string).collect(),
            bounds: bounds.clone(),
            direction: *direction,
            multikey: index.multikey,
            keys: None,
            seen: HashSet::new(),
        }),
        Stage::Fetch => Box::new(FetchStage {
            child: single(children),
            filter,
        }),
        Stage::AndHash => Box::new(AndHashStage {
            children,
            current: 0,
            tables: Vec::new(),
            building: HashMap::new(),
        }),
        Stage::AndSorted => Box::new(AndSortedStage {
            heads: vec![None; children.len()],
            children,
        }),
        Stage::Or { dedup } => Box::new(OrStage {
            children,
            current: 0,
            dedup: *dedup,
            seen: HashSet::new(),
        }),
        Stage::MergeSort { sort, dedup } => Box::new(MergeSortStage {
            heads: vec![None; children.len()],
            exhausted: vec![false; children.len()],
            children,
            sort: sort.clone(),
            dedup: *dedup,
            seen: HashSet::new(),
        }),
        Stage::Sort { pattern, limit } => Box::new(SortStage {
            child: single(children),
            pattern: pattern.clone(),
            limit: *limit,
            buffer: Vec::new(),
            sorted: None,
        }),
        Stage::Limit(n) => Box::new(LimitStage {
            child: single(children),
            remaining: *n,
        }),
        Stage::Skip(n) => Box::new(SkipStage {
            child: single(children),
            remaining: *n,
        }),
        Stage::Projection { spec, kind } => Box::new(ProjectionStage {
            child: single(children),
            spec: spec.clone(),
            kind: *kind,
        }),
    }
}

fn single(mut children: Vec<Box<dyn PlanStage>>) -> Box<dyn PlanStage> {
    match children.pop() {
        Some(child) => child,
        None => Box::new(EofStage),
    }
}

/// Runs a plan to completion and returns its results in output order
pub fn execute_to_completion(
    root: &QuerySolutionNode,
    collection: &Collection,
) -> PlannerResult<Vec<WorkingSetMember>> {
    let mut stage = build_stage(root);
    let mut ws = WorkingSet::new();
    let mut results = Vec::new();
    loop {
        match stage.work(&mut ws, collection)? {
            StageState::Advanced(id) => {
                if let Some(member) = ws.take(id) {
                    results.push(member);
                }
            }
            StageState::NeedTime => {}
            StageState::IsEof => return Ok(results),
        }
    }
}

struct EofStage;

impl PlanStage for EofStage {
    fn work(&mut self, _ws: &mut WorkingSet, _collection: &Collection) -> PlannerResult<StageState> {
        Ok(StageState::IsEof)
    }
}

struct CollectionScanStage {
    direction: SortDirection,
    position: usize,
    filter: Option<MatchExpression>,
}

impl PlanStage for CollectionScanStage {
    fn work(&mut self, ws: &mut WorkingSet, collection: &Collection) -> PlannerResult<StageState> {
        let total = collection.num_records();
        if self.position >= total {
            return Ok(StageState::IsEof);
        }
        let offset = match self.direction {
            SortDirection::Asc => self.position,
            SortDirection::Desc => total - 1 - self.position,
        };
        self.position += 1;

        let record_id = offset as RecordId;
        let Some(doc) = collection.record(record_id) else {
            return Ok(StageState::NeedTime);
        };
        if self.filter.as_ref().map_or(true, |f| f.matches(doc)) {
            let id = ws.allocate(WorkingSetMember::from_record(record_id, doc.clone()));
            Ok(StageState::Advanced(id))
        } else {
            Ok(StageState::NeedTime)
        }
    }
}

struct IndexScanStage {
    index_name: String,
    fields: Vec<String>,
    bounds: IndexBounds,
    direction: SortDirection,
    multikey: bool,
    keys: Option<VecDeque<IndexKeyEntry>>,
    seen: HashSet<RecordId>,
}

impl PlanStage for IndexScanStage {
    fn work(&mut self, ws: &mut WorkingSet, collection: &Collection) -> PlannerResult<StageState> {
        if self.keys.is_none() {
            let keys = collection
                .scan_index(&self.index_name, &self.bounds, self.direction)
                .ok_or_else(|| {
                    PlannerError::plan_killed(format!(
                        "index {} dropped during scan",
                        self.index_name
                    ))
                })?;
            self.keys = Some(keys.into());
            return Ok(StageState::NeedTime);
        }

        let Some(entry) = self.keys.as_mut().and_then(VecDeque::pop_front) else {
            return Ok(StageState::IsEof);
        };

        // A multikey record can produce several keys within the bounds.
        if self.multikey && !self.seen.insert(entry.record_id) {
            return Ok(StageState::NeedTime);
        }

        let key_data = self.fields.iter().cloned().zip(entry.key).collect();
        let id = ws.allocate(WorkingSetMember::from_key(entry.record_id, key_data));
        Ok(StageState::Advanced(id))
    }
}

struct FetchStage {
    child: Box<dyn PlanStage>,
    filter: Option<MatchExpression>,
}

impl PlanStage for FetchStage {
    fn work(&mut self, ws: &mut WorkingSet, collection: &Collection) -> PlannerResult<StageState> {
        let id = match self.child.work(ws, collection)? {
            StageState::Advanced(id) => id,
            other => return Ok(other),
        };

        let Some(member) = ws.get_mut(id) else {
            return Ok(StageState::NeedTime);
        };
        if !member.ensure_doc(collection) {
            ws.free(id);
            return Ok(StageState::NeedTime);
        }

        let passes = match (&self.filter, &member.doc) {
            (Some(filter), Some(doc)) => filter.matches(doc),
            _ => true,
        };
        if passes {
            Ok(StageState::Advanced(id))
        } else {
            ws.free(id);
            Ok(StageState::NeedTime)
        }
    }
}

/// Reads every child but the last into a table, then probes with the last
struct AndHashStage {
    children: Vec<Box<dyn PlanStage>>,
    current: usize,
    tables: Vec<HashMap<RecordId, WorkingSetId>>,
    building: HashMap<RecordId, WorkingSetId>,
}

impl PlanStage for AndHashStage {
    fn work(&mut self, ws: &mut WorkingSet, collection: &Collection) -> PlannerResult<StageState> {
        let last = self.children.len().saturating_sub(1);
        if self.current >= self.children.len() {
            return Ok(StageState::IsEof);
        }

        let state = self.children[self.current].work(ws, collection)?;

        if self.current < last {
            match state {
                StageState::Advanced(id) => {
                    let rid = ws.get(id).and_then(|m| m.record_id);
                    match rid {
                        Some(rid) => {
                            if let Some(previous) = self.building.insert(rid, id) {
                                ws.free(previous);
                            }
                        }
                        None => ws.free(id),
                    }
                }
                StageState::IsEof => {
                    let table = std::mem::take(&mut self.building);
                    // Nothing can intersect an empty table.
                    if table.is_empty() {
                        self.current = self.children.len();
                        return Ok(StageState::IsEof);
                    }
                    self.tables.push(table);
                    self.current += 1;
                }
                StageState::NeedTime => {}
            }
            return Ok(StageState::NeedTime);
        }

        let id = match state {
            StageState::Advanced(id) => id,
            StageState::IsEof => {
                self.current += 1;
                return Ok(StageState::IsEof);
            }
            StageState::NeedTime => return Ok(StageState::NeedTime),
        };

        let Some(rid) = ws.get(id).and_then(|m| m.record_id) else {
            ws.free(id);
            return Ok(StageState::NeedTime);
        };
        if !self.tables.iter().all(|t| t.contains_key(&rid)) {
            ws.free(id);
            return Ok(StageState::NeedTime);
        }

        for table in &mut self.tables {
            if let Some(other) = table.remove(&rid).and_then(|other| ws.take(other)) {
                if let Some(member) = ws.get_mut(id) {
                    member.merge_from(other);
                }
            }
        }
        Ok(StageState::Advanced(id))
    }
}

/// Merge join over children that each return records in record-id order
struct AndSortedStage {
    children: Vec<Box<dyn PlanStage>>,
    heads: Vec<Option<(RecordId, WorkingSetId)>>,
}

impl PlanStage for AndSortedStage {
    fn work(&mut self, ws: &mut WorkingSet, collection: &Collection) -> PlannerResult<StageState> {
        if self.children.is_empty() {
            return Ok(StageState::IsEof);
        }

        if let Some(i) = self.heads.iter().position(Option::is_none) {
            match self.children[i].work(ws, collection)? {
                StageState::Advanced(id) => match ws.get(id).and_then(|m| m.record_id) {
                    Some(rid) => self.heads[i] = Some((rid, id)),
                    None => ws.free(id),
                },
                StageState::NeedTime => {}
                StageState::IsEof => {
                    for (_, id) in self.heads.iter_mut().filter_map(Option::take) {
                        ws.free(id);
                    }
                    self.children.clear();
                    return Ok(StageState::IsEof);
                }
            }
            return Ok(StageState::NeedTime);
        }

        let target = self
            .heads
            .iter()
            .flatten()
            .map(|(rid, _)| *rid)
            .max()
            .unwrap_or_default();

        let mut behind = false;
        for head in &mut self.heads {
            if let Some((rid, id)) = *head {
                if rid < target {
                    ws.free(id);
                    *head = None;
                    behind = true;
                }
            }
        }
        if behind {
            return Ok(StageState::NeedTime);
        }

        let mut ids = self.heads.iter_mut().filter_map(Option::take).map(|(_, id)| id);
        let Some(out) = ids.next() else {
            return Ok(StageState::NeedTime);
        };
        for other in ids.collect::<Vec<_>>() {
            if let Some(member) = ws.take(other) {
                if let Some(target) = ws.get_mut(out) {
                    target.merge_from(member);
                }
            }
        }
        Ok(StageState::Advanced(out))
    }
}

/// Concatenates children, optionally dropping repeated records
struct OrStage {
    children: Vec<Box<dyn PlanStage>>,
    current: usize,
    dedup: bool,
    seen: HashSet<RecordId>,
}

impl PlanStage for OrStage {
    fn work(&mut self, ws: &mut WorkingSet, collection: &Collection) -> PlannerResult<StageState> {
        let Some(child) = self.children.get_mut(self.current) else {
            return Ok(StageState::IsEof);
        };

        match child.work(ws, collection)? {
            StageState::Advanced(id) => {
                let rid = ws.get(id).and_then(|m| m.record_id);
                if self.dedup {
                    if let Some(rid) = rid {
                        if !self.seen.insert(rid) {
                            ws.free(id);
                            return Ok(StageState::NeedTime);
                        }
                    }
                }
                Ok(StageState::Advanced(id))
            }
            StageState::NeedTime => Ok(StageState::NeedTime),
            StageState::IsEof => {
                self.current += 1;
                if self.current >= self.children.len() {
                    Ok(StageState::IsEof)
                } else {
                    Ok(StageState::NeedTime)
                }
            }
        }
    }
}

/// Merges children that each return results in `sort` order
struct MergeSortStage {
    children: Vec<Box<dyn PlanStage>>,
    heads: Vec<Option<WorkingSetId>>,
    exhausted: Vec<bool>,
    sort: SortPattern,
    dedup: bool,
    seen: HashSet<RecordId>,
}

impl PlanStage for MergeSortStage {
    fn work(&mut self, ws: &mut WorkingSet, collection: &Collection) -> PlannerResult<StageState> {
        let pending = (0..self.children.len())
            .find(|&i| self.heads[i].is_none() && !self.exhausted[i]);
        if let Some(i) = pending {
            match self.children[i].work(ws, collection)? {
                StageState::Advanced(id) => {
                    let rid = ws.get(id).and_then(|m| m.record_id);
                    let duplicate = self.dedup && rid.map_or(false, |r| self.seen.contains(&r));
                    if duplicate {
                        ws.free(id);
                    } else {
                        self.heads[i] = Some(id);
                    }
                }
                StageState::NeedTime => {}
                StageState::IsEof => self.exhausted[i] = true,
            }
            return Ok(StageState::NeedTime);
        }

        // Every live child has a head; emit the smallest, earliest child
        // first on ties.
        let mut best: Option<usize> = None;
        for (i, head) in self.heads.iter().enumerate() {
            let Some(id) = head else { continue };
            best = match best {
                None => Some(i),
                Some(b) => {
                    let current = self.heads[b].and_then(|bid| ws.get(bid));
                    match (ws.get(*id), current) {
                        (Some(m), Some(cur)) if compare_members(m, cur, &self.sort) == Ordering::Less => {
                            Some(i)
                        }
                        _ => Some(b),
                    }
                }
            };
        }

        let Some(i) = best else {
            return Ok(StageState::IsEof);
        };
        let Some(id) = self.heads[i].take() else {
            return Ok(StageState::NeedTime);
        };

        if self.dedup {
            if let Some(rid) = ws.get(id).and_then(|m| m.record_id) {
                if !self.seen.insert(rid) {
                    ws.free(id);
                    return Ok(StageState::NeedTime);
                }
            }
        }
        Ok(StageState::Advanced(id))
    }
}

fn compare_members(a: &WorkingSetMember, b: &WorkingSetMember, sort: &SortPattern) -> Ordering {
    for spec in sort.specs() {
        let ord = compare_values(&a.sort_value(&spec.field), &b.sort_value(&spec.field));
        let ord = match spec.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Blocking sort; keeps at most `limit` results
struct SortStage {
    child: Box<dyn PlanStage>,
    pattern: SortPattern,
    limit: Option<u64>,
    buffer: Vec<WorkingSetId>,
    sorted: Option<VecDeque<WorkingSetId>>,
}

impl PlanStage for SortStage {
    fn work(&mut self, ws: &mut WorkingSet, collection: &Collection) -> PlannerResult<StageState> {
        if let Some(sorted) = &mut self.sorted {
            return Ok(match sorted.pop_front() {
                Some(id) => StageState::Advanced(id),
                None => StageState::IsEof,
            });
        }

        match self.child.work(ws, collection)? {
            StageState::Advanced(id) => self.buffer.push(id),
            StageState::NeedTime => {}
            StageState::IsEof => {
                let mut buffer = std::mem::take(&mut self.buffer);
                buffer.sort_by(|a, b| match (ws.get(*a), ws.get(*b)) {
                    (Some(x), Some(y)) => compare_members(x, y, &self.pattern)
                        .then_with(|| x.record_id.cmp(&y.record_id)),
                    _ => Ordering::Equal,
                });
                if let Some(limit) = self.limit {
                    for id in buffer.split_off((limit as usize).min(buffer.len())) {
                        ws.free(id);
                    }
                }
                self.sorted = Some(buffer.into());
            }
        }
        Ok(StageState::NeedTime)
    }
}

struct LimitStage {
    child: Box<dyn PlanStage>,
    remaining: u64,
}

impl PlanStage for LimitStage {
    fn work(&mut self, ws: &mut WorkingSet, collection: &Collection) -> PlannerResult<StageState> {
        if self.remaining == 0 {
            return Ok(StageState::IsEof);
        }
        let state = self.child.work(ws, collection)?;
        if let StageState::Advanced(_) = state {
            self.remaining -= 1;
        }
        Ok(state)
    }
}

struct SkipStage {
    child: Box<dyn PlanStage>,
    remaining: u64,
}

impl PlanStage for SkipStage {
    fn work(&mut self, ws: &mut WorkingSet, collection: &Collection) -> PlannerResult<StageState> {
        match self.child.work(ws, collection)? {
            StageState::Advanced(id) if self.remaining > 0 => {
                self.remaining -= 1;
                ws.free(id);
                Ok(StageState::NeedTime)
            }
            state => Ok(state),
        }
    }
}

struct ProjectionStage {
    child: Box<dyn PlanStage>,
    spec: Projection,
    kind: ProjectionKind,
}

impl PlanStage for ProjectionStage {
    fn work(&mut self, ws: &mut WorkingSet, collection: &Collection) -> PlannerResult<StageState> {
        let id = match self.child.work(ws, collection)? {
            StageState::Advanced(id) => id,
            other => return Ok(other),
        };
        let Some(member) = ws.get_mut(id) else {
            return Ok(StageState::NeedTime);
        };

        let projected = match self.kind {
            ProjectionKind::CoveredOneIndex => self.spec.apply_to_key_data(&member.key_data),
            ProjectionKind::SimpleDoc | ProjectionKind::Default => {
                member.ensure_doc(collection);
                member
                    .doc
                    .as_ref()
                    .map(|doc| self.spec.apply(doc))
                    .unwrap_or(Value::Null)
            }
        };
        member.doc = Some(projected);
        member.key_data.clear();
        Ok(StageState::Advanced(id))
    }
}
