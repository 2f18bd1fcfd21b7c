//! Parsing of showq and showbf XML output.
//!
//! showq:
//! ```xml
//! <Data><Object>queue</Object>
//!   <cluster time="1529000000" LocalUpProcs="..."/>
//!   <queue option="active"><job JobID="..." Account="..." .../></queue>
//!   <queue option="eligible">...</queue>
//! </Data>
//! ```
//!
//! showbf:
//! ```xml
//! <Data><Object>cluster</Object>
//!   <job time="1529000000" .../>
//!   <par Name="titan"><range duration="..." index="0" proccount="..." .../></par>
//! </Data>
//! ```

use bfscope_core::{BackfillRecord, JobRecord, SampleId};
use bfscope_parsers::{non_empty_string, parse_epoch, parse_int, parse_opt_int};
use bfscope_store::{BackfillSample, QueueSample};
use roxmltree::{Document, Node};

fn text_attr(node: Node<'_, '_>, name: &str) -> Option<String> {
    node.attribute(name).and_then(non_empty_string)
}

fn int_attr(node: Node<'_, '_>, name: &str) -> Option<i64> {
    parse_opt_int(node.attribute(name))
}

fn epoch_attr(node: Node<'_, '_>, name: &str) -> Option<i64> {
    node.attribute(name).and_then(parse_epoch)
}

fn job_record(node: Node<'_, '_>) -> JobRecord {
    JobRecord {
        job_id: text_attr(node, "JobID"),
        account: text_attr(node, "Account"),
        user: text_attr(node, "User"),
        class: text_attr(node, "Class"),
        job_name: text_attr(node, "JobName"),
        req_procs: int_attr(node, "ReqProcs"),
        req_nodes: int_attr(node, "ReqNodes"),
        req_walltime: int_attr(node, "ReqAWDuration"),
        start_time: epoch_attr(node, "StartTime"),
        submission_time: epoch_attr(node, "SubmissionTime"),
        eligible_elapsed: int_attr(node, "EEDuration"),
        completion_time: epoch_attr(node, "CompletionTime"),
        completion_code: int_attr(node, "CompletionCode"),
    }
}

fn jobs_in(queue: Node<'_, '_>) -> impl Iterator<Item = JobRecord> {
    queue
        .children()
        .filter(|n| n.has_tag_name("job"))
        .map(job_record)
}

/// Parse a showq capture.
///
/// Returns `Ok(None)` when the capture carries no `<cluster time>`; such a
/// poll cannot be placed in time and is not imported.
pub fn parse_showq(sample_id: &SampleId, text: &str) -> Result<Option<QueueSample>, roxmltree::Error> {
    let doc = Document::parse(text)?;
    let root = doc.root_element();

    let sample_time = root
        .children()
        .find(|n| n.has_tag_name("cluster"))
        .and_then(|n| n.attribute("time"))
        .and_then(parse_int);
    let Some(sample_time) = sample_time else {
        return Ok(None);
    };

    let mut sample = QueueSample {
        sample_id: sample_id.clone(),
        sample_time,
        active: Vec::new(),
        eligible: Vec::new(),
        completed: Vec::new(),
    };
    for queue in root.children().filter(|n| n.has_tag_name("queue")) {
        match queue.attribute("option") {
            Some("active") => sample.active.extend(jobs_in(queue)),
            Some("eligible") => sample.eligible.extend(jobs_in(queue)),
            Some("completed") => sample.completed.extend(jobs_in(queue)),
            _ => {}
        }
    }
    Ok(Some(sample))
}

/// Parse a showbf capture.
///
/// The `template` partition is a placeholder MOAB always emits and is skipped.
pub fn parse_showbf(
    sample_id: &SampleId,
    text: &str,
) -> Result<Option<BackfillSample>, roxmltree::Error> {
    let doc = Document::parse(text)?;
    let root = doc.root_element();

    let sample_time = root
        .children()
        .find(|n| n.has_tag_name("job"))
        .and_then(|n| n.attribute("time"))
        .and_then(parse_int);
    let Some(sample_time) = sample_time else {
        return Ok(None);
    };

    let mut windows = Vec::new();
    for par in root.children().filter(|n| n.has_tag_name("par")) {
        let Some(partition) = par.attribute("Name").filter(|&name| name != "template") else {
            continue;
        };
        for (position, range) in par
            .children()
            .filter(|n| n.has_tag_name("range"))
            .enumerate()
        {
            windows.push(BackfillRecord {
                partition: partition.to_string(),
                index: int_attr(range, "index").unwrap_or(position as i64),
                proccount: int_attr(range, "proccount"),
                nodecount: int_attr(range, "nodecount"),
                duration: int_attr(range, "duration"),
                starttime: int_attr(range, "starttime"),
            });
        }
    }

    Ok(Some(BackfillSample {
        sample_id: sample_id.clone(),
        sample_time,
        windows,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOWQ: &str = r#"<Data><Object>queue</Object>
<cluster LocalActiveNodes="18000" LocalUpProcs="299008" time="1529000000"></cluster>
<queue count="2" option="active">
  <job Account="CSC108" Class="batch" JobID="4001" JobName="SAGA-Python-PBSJobScript.a" ReqAWDuration="7200" ReqProcs="1600" StartTime="1528999000" SubmissionTime="1528998000" User="doleynik"></job>
  <job Account="BIP123" Class="batch" JobID="4002" JobName="run" ReqAWDuration="3600.0" ReqNodes="8" ReqProcs="128" StartTime="1528999500" SubmissionTime="1528990000" User="alice"></job>
</queue>
<queue count="1" option="eligible">
  <job Account="BIP123" Class="batch" EEDuration="120" JobID="4003" JobName="big" ReqAWDuration="3600" ReqProcs="3200" StartTime="0" SubmissionTime="1528999800" User="alice"></job>
</queue>
<queue count="1" option="blocked">
  <job Account="BIP123" Class="batch" JobID="4004" ReqProcs="16" User="alice"></job>
</queue>
</Data>"#;

    const SHOWBF: &str = r#"<Data><Object>cluster</Object>
<job time="1529000000" User="ALL"></job>
<par Name="template"><range duration="1" index="0" proccount="1" nodecount="1" starttime="1"></range></par>
<par Name="titan">
  <range duration="5400" index="0" nodecount="100" proccount="1600" reqid="0" starttime="1529000000"></range>
  <range duration="86400" index="1" nodecount="40" proccount="640" reqid="0" starttime="1529003600"></range>
</par>
</Data>"#;

    #[test]
    fn test_parse_showq() {
        let sample = parse_showq(&SampleId::new("ab12"), SHOWQ).unwrap().unwrap();
        assert_eq!(sample.sample_time, 1529000000);
        assert_eq!(sample.active.len(), 2);
        assert_eq!(sample.eligible.len(), 1);
        assert!(sample.completed.is_empty());

        let tenant = &sample.active[0];
        assert_eq!(tenant.account.as_deref(), Some("CSC108"));
        assert_eq!(tenant.req_procs, Some(1600));
        assert_eq!(tenant.req_nodes, None);
        assert_eq!(sample.active[1].req_walltime, Some(3600));
        assert_eq!(sample.active[1].req_nodes, Some(8));

        // StartTime="0" means not started
        assert_eq!(sample.eligible[0].start_time, None);
        assert_eq!(sample.eligible[0].eligible_elapsed, Some(120));
    }

    #[test]
    fn test_parse_showq_without_time() {
        let text = r#"<Data><cluster LocalUpProcs="1"></cluster></Data>"#;
        assert!(parse_showq(&SampleId::new("x"), text).unwrap().is_none());
    }

    #[test]
    fn test_parse_showq_rejects_garbage() {
        assert!(parse_showq(&SampleId::new("x"), "<Data><cluster").is_err());
    }

    #[test]
    fn test_parse_showbf_skips_template() {
        let sample = parse_showbf(&SampleId::new("ab12"), SHOWBF).unwrap().unwrap();
        assert_eq!(sample.sample_time, 1529000000);
        assert_eq!(sample.windows.len(), 2);
        assert!(sample.windows.iter().all(|w| w.partition == "titan"));
        assert_eq!(sample.windows[0].proccount, Some(1600));
        assert_eq!(sample.windows[1].index, 1);
        assert_eq!(sample.windows[1].starttime, Some(1529003600));
    }

    #[test]
    fn test_parse_showq_completed_queue() {
        let text = r#"<Data><cluster time="50"></cluster>
<queue option="completed"><job JobID="1" CompletionCode="0" CompletionTime="49" StartTime="10"></job></queue>
</Data>"#;
        let sample = parse_showq(&SampleId::new("c"), text).unwrap().unwrap();
        assert_eq!(sample.completed.len(), 1);
        assert_eq!(sample.completed[0].completion_code, Some(0));
        assert_eq!(sample.completed[0].completion_time, Some(49));
    }
}
