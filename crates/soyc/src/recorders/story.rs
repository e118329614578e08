//! The stories document: which source is responsible for each byte of output
//!
//! Every fragment's provenance ranges are flattened into a partition (see
//! [`partition`]) and each slice is written as a story. A source info gets its
//! story, and its correlations are resolved, the first time one of its ranges
//! is entered, so ids follow dependency order and ranges whose output is fully
//! covered by their children still register their members. Later slices from
//! the same source info reuse the story as a shadow copy.

mod partition;

use std::{collections::BTreeSet, io::Write};

use anyhow::{Context, Result, bail};
use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};

use super::XML_PROLOG;
use crate::{
    compile_output::CompileOutput,
    members::{Member, MemberFactory},
    program::{Axis, Correlation, Program, Range, SourceInfoId},
    story::{Story, StoryId},
    writer::{FlushingWriter, escape_attr, escape_text},
};

use partition::{Segment, partition};

/// Streams the stories document fragment by fragment
pub struct StoryRecorder<'a, 'p, W: Write> {
    factory: &'a MemberFactory<'p>,
    program: &'p Program,
    out: FlushingWriter<W>,
    /// Story of every source info observed so far, as first observed
    stories: FxHashMap<SourceInfoId, Story>,
    /// Source infos whose attribution has been written
    attributed: FxHashSet<SourceInfoId>,
    /// Correlations already resolved to members
    resolved: FxHashMap<Correlation, Member>,
    stories_written: usize,
}

impl<W: Write> std::fmt::Debug for StoryRecorder<'_, '_, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryRecorder")
            .field("stories", &self.stories.len())
            .field("stories_written", &self.stories_written)
            .finish_non_exhaustive()
    }
}

impl<'a, 'p, W: Write> StoryRecorder<'a, 'p, W> {
    pub fn new(factory: &'a MemberFactory<'p>, mut out: FlushingWriter<W>) -> Result<Self> {
        out.push_str(XML_PROLOG)?;
        out.push_str("<soyc>\n<stories>\n")?;
        Ok(Self {
            factory,
            program: factory.program(),
            out,
            stories: FxHashMap::default(),
            attributed: FxHashSet::default(),
            resolved: FxHashMap::default(),
            stories_written: 0,
        })
    }

    /// Partition one fragment's output and write a story per slice
    ///
    /// Ranges are byte offsets into `js` and must cover all of it. Returns the
    /// number of stories written.
    pub fn record_fragment(
        &mut self,
        fragment: usize,
        js: &str,
        ranges: &[(Range, SourceInfoId)],
    ) -> Result<usize> {
        for (range, info) in ranges {
            if range.start > range.end
                || range.end > js.len()
                || !js.is_char_boundary(range.start)
                || !js.is_char_boundary(range.end)
            {
                bail!(
                    "Range {range} of {info:?} does not fit the {} bytes of fragment {fragment}",
                    js.len()
                );
            }
        }

        let segments = partition(ranges, |range, info| self.observe(fragment, range, info))
            .with_context(|| format!("Cannot attribute the output of fragment {fragment}"))?;
        let covered = segments.last().map_or(0, |segment| segment.range.end);
        if covered != js.len() {
            bail!(
                "Output [{covered}, {}) of fragment {fragment} is not covered by any range",
                js.len()
            );
        }

        for segment in &segments {
            let (story, first_slice) = self.slice(fragment, segment)?;
            self.write_story(&story, first_slice, fragment, js, segment.range)?;
        }
        debug!(
            "Fragment {fragment}: {} ranges reconciled into {} stories",
            ranges.len(),
            segments.len()
        );
        Ok(segments.len())
    }

    /// Distinct stories created so far
    pub fn story_count(&self) -> usize {
        self.stories.len()
    }

    pub fn stories_written(&self) -> usize {
        self.stories_written
    }

    /// Close the document and return the sink
    pub fn finish(mut self) -> Result<W> {
        self.out.push_str("</stories>\n</soyc>\n")?;
        debug!(
            "Wrote {} story references to {} distinct stories",
            self.stories_written,
            self.stories.len()
        );
        // Release member handles before the final flush
        self.stories.clear();
        self.attributed.clear();
        self.resolved.clear();
        Ok(self.out.finish()?)
    }

    /// Create the story of `info` the first time one of its ranges is entered
    fn observe(&mut self, fragment: usize, range: Range, info: SourceInfoId) -> Result<()> {
        if self.stories.contains_key(&info) {
            return Ok(());
        }
        let id = StoryId::new(u32::try_from(self.stories.len())?);
        let story = self.new_story(id, fragment, range.len(), info)?;
        self.stories.insert(info, story);
        Ok(())
    }

    /// The story for a segment, and whether this is its first written slice
    fn slice(&mut self, fragment: usize, segment: &Segment) -> Result<(Story, bool)> {
        let Some(story) = self.stories.get(&segment.info) else {
            bail!("{:?} was attributed output without being observed", segment.info);
        };
        let length = segment.range.len();
        let story = if story.fragment() == fragment && story.length() == length {
            story.clone()
        } else {
            story.shadow(fragment, length)
        };
        Ok((story, self.attributed.insert(segment.info)))
    }

    fn new_story(
        &mut self,
        id: StoryId,
        fragment: usize,
        length: usize,
        info_id: SourceInfoId,
    ) -> Result<Story> {
        let program = self.program;
        let info = program.source_info(info_id)?;

        let mut members = BTreeSet::new();
        let mut origins: BTreeSet<_> = info.origin.iter().cloned().collect();
        for correlation in &info.correlations {
            match correlation {
                Correlation::Class(_) | Correlation::Field(_) | Correlation::Method(_) => {
                    members.insert(self.resolve(correlation)?);
                }
                Correlation::Origin(origin) => {
                    origins.insert(origin.clone());
                }
                Correlation::Literal(_) | Correlation::Function(_) => {}
            }
        }
        let literal_type = match info.primary_correlation(Axis::Literal) {
            Some(Correlation::Literal(description)) => Some(description.clone()),
            _ => None,
        };
        let mutations = info.mutations.iter().map(ToString::to_string).collect();

        trace!("New {id} for {info_id:?} with {} members", members.len());
        Ok(Story::new(
            id,
            fragment,
            length,
            literal_type,
            members,
            origins,
            mutations,
        ))
    }

    /// Canonical member for a declaration correlation, registering it on its class
    fn resolve(&mut self, correlation: &Correlation) -> Result<Member> {
        if let Some(member) = self.resolved.get(correlation) {
            return Ok(member.clone());
        }

        let member = match correlation {
            Correlation::Class(id) => Member::Class(self.factory.class(*id)?),
            Correlation::Field(id) => {
                let field = self.factory.field(*id)?;
                if let Some(class) = field.enclosing() {
                    class.add_field(field.clone());
                }
                Member::Field(field)
            }
            Correlation::Method(id) => {
                let method = self.factory.method(*id)?;
                if let Some(class) = method.enclosing() {
                    class.add_method(method.clone());
                }
                Member::Method(method)
            }
            other => bail!("Correlation {other:?} does not name a declaration"),
        };
        self.resolved.insert(correlation.clone(), member.clone());
        Ok(member)
    }

    fn write_story(
        &mut self,
        story: &Story,
        first_slice: bool,
        fragment: usize,
        js: &str,
        range: Range,
    ) -> Result<()> {
        let id = story.id();
        write!(self.out, "<story id=\"{id}\"")?;
        if let Some(literal) = story.literal_type() {
            write!(self.out, " literal=\"{}\"", escape_attr(literal))?;
        }
        self.out.push_str(">\n")?;

        // Later slices refer back to the attribution written with the first one
        if first_slice {
            self.write_attribution(story)?;
        }

        writeln!(self.out, "<js fragment=\"{fragment}\"/>")?;
        let text = &js[range.start..range.end];
        if text.is_empty() || text == "\n" {
            writeln!(self.out, "<storyref idref=\"{id}\"/>")?;
        } else {
            writeln!(
                self.out,
                "<storyref idref=\"{id}\">{}</storyref>",
                escape_text(text)
            )?;
        }
        self.out.push_str("</story>\n")?;
        self.stories_written += 1;
        Ok(())
    }

    fn write_attribution(&mut self, story: &Story) -> Result<()> {
        if !story.origins().is_empty() {
            self.out.push_str("<origins>\n")?;
            for origin in story.origins() {
                writeln!(
                    self.out,
                    "<origin lineNumber=\"{}\" location=\"{}\"/>",
                    origin.line_number(),
                    escape_attr(origin.location())
                )?;
            }
            self.out.push_str("</origins>\n")?;
        }
        if !story.members().is_empty() {
            self.out.push_str("<correlations>\n")?;
            for member in story.members() {
                writeln!(self.out, "<by idref=\"{}\"/>", escape_attr(member.source_name()))?;
            }
            self.out.push_str("</correlations>\n")?;
        }
        Ok(())
    }
}

/// Write the stories document for every fragment of `compile`, in order
pub fn record_stories<W: Write>(
    factory: &MemberFactory<'_>,
    compile: &CompileOutput,
    out: FlushingWriter<W>,
) -> Result<W> {
    let mut recorder = StoryRecorder::new(factory, out)?;
    for (idx, fragment) in compile.fragments.iter().enumerate() {
        recorder.record_fragment(idx, &fragment.js, &fragment.ranges)?;
    }
    recorder.finish()
}
