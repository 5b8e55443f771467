//! Collection schema definition.
//!
//! Text properties are vectorized unless explicitly opted out with
//! [`PropertySpec::filter_only`], which is how `category` stays out of the
//! embedding and serves purely as a filter predicate. Filter-only
//! properties are also indexed with whole-field tokenization so that an
//! `Equal` filter matches the exact, case-sensitive value.

use serde_json::{json, Map, Value};

use crate::config::Config;

/// How Weaviate splits a text property for its inverted index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tokenization {
    /// Lowercased alphanumeric words.
    Word,
    /// The whole trimmed value as one token.
    Field,
}

impl Tokenization {
    pub fn as_str(self) -> &'static str {
        match self {
            Tokenization::Word => "word",
            Tokenization::Field => "field",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySpec {
    pub name: String,
    pub skip_vectorization: bool,
    pub vectorize_property_name: bool,
    pub tokenization: Tokenization,
}

impl PropertySpec {
    /// A vectorized text property.
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            skip_vectorization: false,
            vectorize_property_name: true,
            tokenization: Tokenization::Word,
        }
    }

    /// Exclude this property (and its name) from vectorization and index it
    /// as a single token.
    pub fn filter_only(mut self) -> Self {
        self.skip_vectorization = true;
        self.vectorize_property_name = false;
        self.tokenization = Tokenization::Field;
        self
    }
}

/// Generative module wiring, so the collection can also answer
/// Weaviate-side `generate` queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerativeConfig {
    pub module: String,
    pub api_endpoint: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    pub name: String,
    pub vectorizer: String,
    pub generative: Option<GenerativeConfig>,
    pub properties: Vec<PropertySpec>,
}

impl CollectionSchema {
    pub fn vectorized_properties(&self) -> impl Iterator<Item = &PropertySpec> {
        self.properties.iter().filter(|p| !p.skip_vectorization)
    }

    /// Weaviate class definition for `POST /v1/schema`.
    pub fn to_class_json(&self) -> Value {
        let properties: Vec<Value> = self
            .properties
            .iter()
            .map(|p| {
                let mut prop = json!({
                    "name": p.name,
                    "dataType": ["text"],
                    "tokenization": p.tokenization.as_str(),
                });
                if self.vectorizer != "none" {
                    let mut module = Map::new();
                    module.insert(
                        self.vectorizer.clone(),
                        json!({
                            "skip": p.skip_vectorization,
                            "vectorizePropertyName": p.vectorize_property_name,
                        }),
                    );
                    prop["moduleConfig"] = Value::Object(module);
                }
                prop
            })
            .collect();

        let mut module_config = Map::new();
        if let Some(generative) = &self.generative {
            module_config.insert(
                generative.module.clone(),
                json!({
                    "apiEndpoint": generative.api_endpoint,
                    "model": generative.model,
                }),
            );
        }

        json!({
            "class": self.name,
            "vectorizer": self.vectorizer,
            "moduleConfig": module_config,
            "properties": properties,
        })
    }
}

/// The article collection: `title` and `content` vectorized, `category`
/// filter-only.
pub fn article_schema(config: &Config) -> CollectionSchema {
    CollectionSchema {
        name: config.weaviate.collection.clone(),
        vectorizer: config.weaviate.vectorizer.clone(),
        generative: Some(GenerativeConfig {
            module: "generative-ollama".to_string(),
            api_endpoint: config.ollama.generative_endpoint.clone(),
            model: config.ollama.model.clone(),
        }),
        properties: vec![
            PropertySpec::text("title"),
            PropertySpec::text("content"),
            PropertySpec::text("category").filter_only(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_properties_are_vectorized_by_default() {
        let p = PropertySpec::text("title");
        assert!(!p.skip_vectorization);
        assert!(p.vectorize_property_name);
        assert_eq!(p.tokenization, Tokenization::Word);
    }

    #[test]
    fn article_schema_excludes_category_from_vectors() {
        let schema = article_schema(&Config::default());
        let names: Vec<_> = schema
            .vectorized_properties()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["title", "content"]);
    }

    #[test]
    fn class_json_matches_weaviate_shape() {
        let class = article_schema(&Config::default()).to_class_json();
        assert_eq!(class["class"], "Article");
        assert_eq!(class["vectorizer"], "text2vec-transformers");
        assert_eq!(
            class["moduleConfig"]["generative-ollama"]["model"],
            "llama3:8b"
        );

        let category = &class["properties"][2];
        assert_eq!(category["name"], "category");
        assert_eq!(category["dataType"], json!(["text"]));
        assert_eq!(category["tokenization"], "field");
        assert_eq!(class["properties"][0]["tokenization"], "word");
        assert_eq!(class["properties"][1]["tokenization"], "word");
        assert_eq!(
            category["moduleConfig"]["text2vec-transformers"],
            json!({"skip": true, "vectorizePropertyName": false})
        );
        assert_eq!(
            class["properties"][0]["moduleConfig"]["text2vec-transformers"]["skip"],
            false
        );
    }

    #[test]
    fn no_property_module_config_without_vectorizer() {
        let mut schema = article_schema(&Config::default());
        schema.vectorizer = "none".to_string();
        schema.generative = None;
        let class = schema.to_class_json();
        assert!(class["properties"][0].get("moduleConfig").is_none());
        assert_eq!(class["moduleConfig"], json!({}));
    }
}
