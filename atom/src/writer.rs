//! Atom entry and feed serialization.
//!
//! Links whose transition has an embedding are written inline
//! (`<m:inline>` carrying the nested entry or feed); all others are
//! deferred, typed `feed` or `entry` from the link's target variant.

use crate::media::{ATOM_ENTRY_TYPE, ATOM_FEED_TYPE, ATOM_NS, DATA_NS, METADATA_NS, SCHEME_NS};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use waypoint_core::{
    CollectionResource, EngineError, EngineResult, EntityCatalog, EntityPayload, EntityProperties, EntityResource,
    Link, RestResource,
};

type XmlWriter = Writer<Vec<u8>>;

pub struct AtomWriter<'a> {
    base: &'a str,
    catalog: &'a dyn EntityCatalog,
    updated: String,
}

impl<'a> AtomWriter<'a> {
    /// `base` is the service base every relative href resolves against.
    pub fn new(base: &'a str, catalog: &'a dyn EntityCatalog) -> Self {
        Self {
            base,
            catalog,
            updated: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        }
    }

    pub fn entry_document(&self, resource: &EntityResource) -> EngineResult<Vec<u8>> {
        let mut w = Writer::new(Vec::new());
        emit(&mut w, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), Some("yes"))))?;
        self.entry(&mut w, resource, true)?;
        Ok(w.into_inner())
    }

    pub fn feed_document(&self, resource: &CollectionResource) -> EngineResult<Vec<u8>> {
        let mut w = Writer::new(Vec::new());
        emit(&mut w, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), Some("yes"))))?;
        self.feed(&mut w, resource, true)?;
        Ok(w.into_inner())
    }

    fn root_start(&self, name: &'static str, root: bool) -> BytesStart<'static> {
        let mut start = BytesStart::new(name);
        if root {
            start.push_attribute(("xml:base", self.base));
            start.push_attribute(("xmlns", ATOM_NS));
            start.push_attribute(("xmlns:d", DATA_NS));
            start.push_attribute(("xmlns:m", METADATA_NS));
        }
        start.into_owned()
    }

    fn entry(&self, w: &mut XmlWriter, resource: &EntityResource, root: bool) -> EngineResult<()> {
        let (id, type_name, properties) = self.describe(resource);

        emit(w, Event::Start(self.root_start("entry", root)))?;
        text_element(w, "id", &[], &self.absolute(&id))?;
        text_element(w, "title", &[("type", "text")], "")?;
        text_element(w, "updated", &[], &self.updated)?;
        emit(w, Event::Start(BytesStart::new("author")))?;
        emit(w, Event::Empty(BytesStart::new("name")))?;
        emit(w, Event::End(BytesEnd::new("author")))?;

        for link in &resource.links {
            let embedded = link.transition_id().and_then(|id| resource.embedded.get(&id));
            self.link(w, link, embedded)?;
        }

        if let Some(term) = type_name {
            let mut category = BytesStart::new("category");
            category.push_attribute(("term", term.as_str()));
            category.push_attribute(("scheme", SCHEME_NS));
            emit(w, Event::Empty(category))?;
        }

        let mut content = BytesStart::new("content");
        content.push_attribute(("type", "application/xml"));
        emit(w, Event::Start(content))?;
        write_properties(w, properties)?;
        emit(w, Event::End(BytesEnd::new("content")))?;

        emit(w, Event::End(BytesEnd::new("entry")))
    }

    fn feed(&self, w: &mut XmlWriter, resource: &CollectionResource, root: bool) -> EngineResult<()> {
        let self_href = resource
            .links
            .iter()
            .find(|l| l.is_self())
            .map(|l| l.href.clone())
            .unwrap_or_default();
        let title = resource
            .entities
            .iter()
            .find_map(EntityResource::typed)
            .map(|t| t.entity_set.clone())
            .or_else(|| resource.entity_name.clone())
            .unwrap_or_default();

        emit(w, Event::Start(self.root_start("feed", root)))?;
        text_element(w, "title", &[("type", "text")], &title)?;
        text_element(w, "id", &[], &self.absolute(&self_href))?;
        text_element(w, "updated", &[], &self.updated)?;
        for link in &resource.links {
            let embedded = link.transition_id().and_then(|id| resource.embedded.get(&id));
            self.link(w, link, embedded)?;
        }
        if let Some(count) = resource.inline_count {
            text_element(w, "m:count", &[], &count.to_string())?;
        }
        for member in &resource.entities {
            self.entry(w, member, false)?;
        }
        emit(w, Event::End(BytesEnd::new("feed")))
    }

    fn link(&self, w: &mut XmlWriter, link: &Link, embedded: Option<&RestResource>) -> EngineResult<()> {
        let mut start = BytesStart::new("link");
        start.push_attribute(("rel", link.rel.as_str()));
        if !link.is_self() {
            let link_type = if link.is_collection() { ATOM_FEED_TYPE } else { ATOM_ENTRY_TYPE };
            start.push_attribute(("type", link_type));
        }
        start.push_attribute(("title", link.title.as_str()));
        start.push_attribute(("href", link.href.as_str()));

        let Some(embedded) = embedded else {
            return emit(w, Event::Empty(start));
        };
        emit(w, Event::Start(start))?;
        emit(w, Event::Start(BytesStart::new("m:inline")))?;
        match embedded {
            RestResource::Entity(entity) => self.entry(w, entity, false)?,
            RestResource::Collection(collection) => self.feed(w, collection, false)?,
        }
        emit(w, Event::End(BytesEnd::new("m:inline")))?;
        emit(w, Event::End(BytesEnd::new("link")))
    }

    /// Entry id (relative), qualified type name and properties.
    fn describe<'r>(&self, resource: &'r EntityResource) -> (String, Option<String>, Option<&'r EntityProperties>) {
        let self_href = resource
            .links
            .iter()
            .find(|l| l.is_self())
            .map(|l| l.href.clone());
        match &resource.entity {
            Some(EntityPayload::Typed(typed)) => {
                let type_name = self
                    .catalog
                    .find_entity_set(&typed.entity_set)
                    .map(|t| self.catalog.qualified_name(&t.name))
                    .or_else(|| resource.entity_name.as_deref().map(|n| self.catalog.qualified_name(n)));
                (typed.rel_id(), type_name, Some(&typed.properties))
            }
            Some(EntityPayload::Generic(entity)) => (
                self_href.unwrap_or_else(|| entity.name.clone()),
                Some(self.catalog.qualified_name(&entity.name)),
                Some(&entity.properties),
            ),
            None => (
                self_href.unwrap_or_default(),
                resource.entity_name.as_deref().map(|n| self.catalog.qualified_name(n)),
                None,
            ),
        }
    }

    fn absolute(&self, href: &str) -> String {
        if href.contains("://") {
            href.to_string()
        } else {
            format!("{}{}", self.base, href)
        }
    }
}

fn write_properties(w: &mut XmlWriter, properties: Option<&EntityProperties>) -> EngineResult<()> {
    let Some(properties) = properties.filter(|p| !p.is_empty()) else {
        return emit(w, Event::Empty(BytesStart::new("m:properties")));
    };
    emit(w, Event::Start(BytesStart::new("m:properties")))?;
    for (name, value) in properties {
        let element = format!("d:{name}");
        if value.is_null() {
            let mut start = BytesStart::new(element.as_str());
            start.push_attribute(("m:null", "true"));
            emit(w, Event::Empty(start))?;
            continue;
        }
        let edm = value.edm_type();
        let attrs: &[(&str, &str)] = if edm == "Edm.String" { &[] } else { &[("m:type", edm)] };
        text_element(w, &element, attrs, &value.to_string())?;
    }
    emit(w, Event::End(BytesEnd::new("m:properties")))
}

fn text_element(w: &mut XmlWriter, name: &str, attrs: &[(&str, &str)], text: &str) -> EngineResult<()> {
    let mut start = BytesStart::new(name);
    for attr in attrs {
        start.push_attribute(*attr);
    }
    if text.is_empty() {
        return emit(w, Event::Empty(start));
    }
    emit(w, Event::Start(start))?;
    emit(w, Event::Text(BytesText::new(text)))?;
    emit(w, Event::End(BytesEnd::new(name)))
}

fn emit(w: &mut XmlWriter, event: Event<'_>) -> EngineResult<()> {
    w.write_event(event)
        .map_err(|e| EngineError::Malformed(format!("failed to write XML: {e}")))
}
