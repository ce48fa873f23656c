//! Typed operations over the raw command primitive
//!
//! Each operation formats one scripting-API command, sends it through
//! `send_command`/`send_command_with`, and decodes the reply with the
//! parser helpers. Boolean replies follow the wire conventions: most
//! predicates answer a bare `true`, mutations answer `Ok` or an error
//! marker, and a few legacy commands invert their flag (noted inline).

use super::{ClassKind, OmcProxy};
use crate::error::ProxyError;
use crate::parser::{
    contains_ci, modifier_value, parse_expression, split_arrays, split_list, strip_braces,
    strip_parens, unquote, unquote_list,
};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// One component declaration as reported by `getComponents`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub class_name: String,
    pub name: String,
    pub comment: String,
    pub is_protected: bool,
    pub is_final: bool,
    pub is_flow: bool,
    pub is_stream: bool,
    pub is_replaceable: bool,
    pub variability: String,
    pub is_inner: bool,
    pub is_outer: bool,
    pub causality: String,
    pub array_indices: Vec<String>,
}

impl Component {
    /// Decode one `{class,name,"comment",...}` chunk
    pub fn parse(text: &str) -> Option<Component> {
        let fields = split_list(strip_braces(text.trim()));
        if fields.len() < 11 {
            return None;
        }
        Some(Component {
            class_name: fields[0].clone(),
            name: unquote(&fields[1]).to_string(),
            comment: unquote(&fields[2]).to_string(),
            is_protected: contains_ci(&fields[3], "protected"),
            is_final: contains_ci(&fields[4], "true"),
            is_flow: contains_ci(&fields[5], "true"),
            is_stream: contains_ci(&fields[6], "true"),
            is_replaceable: contains_ci(&fields[7], "true"),
            variability: unquote(&fields[8]).to_string(),
            // a single field carries "inner", "outer", "innerouter" or "none"
            is_inner: contains_ci(&fields[9], "inner"),
            is_outer: contains_ci(&fields[9], "outer"),
            causality: unquote(&fields[10]).to_string(),
            array_indices: fields
                .get(11)
                .map(|indices| unquote_list(indices))
                .unwrap_or_default(),
        })
    }
}

/// Escape a string for embedding in a quoted command argument
pub fn escape_string(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

impl OmcProxy {
    fn query(&mut self, expression: &str) -> Result<String, ProxyError> {
        self.send_command(expression)?;
        Ok(self.result().to_string())
    }

    /// The bare-`true` reply convention
    fn reply_true(&self) -> bool {
        contains_ci(self.result(), "true")
    }

    /// The `Ok` reply convention of mutation commands
    fn reply_ok(&self) -> bool {
        contains_ci(self.result(), "ok")
    }

    fn reply_has_error(&self) -> bool {
        contains_ci(self.result(), "error")
    }

    // --- version and environment ---------------------------------------

    pub fn version(&mut self) -> Result<String, ProxyError> {
        self.send_command("getVersion()")?;
        Ok(unquote(self.result()).to_string())
    }

    pub fn annotation_version(&mut self) -> Result<String, ProxyError> {
        self.send_command("getAnnotationVersion()")?;
        Ok(unquote(self.result()).to_string())
    }

    pub fn set_annotation_version(&mut self, version: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!("setAnnotationVersion(\"{}\")", version))?;
        Ok(contains_ci(self.result(), version))
    }

    pub fn get_environment_var(&mut self, name: &str) -> Result<String, ProxyError> {
        self.send_command(&format!("getEnvironmentVar(\"{}\")", name))?;
        Ok(unquote(self.result()).to_string())
    }

    pub fn set_environment_var(&mut self, name: &str, value: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "setEnvironmentVar(\"{}\",\"{}\")",
            name,
            escape_string(value)
        ))?;
        Ok(!self.reply_has_error())
    }

    /// Load every library configured for startup
    pub fn load_system_libraries(&mut self) -> Result<(), ProxyError> {
        let libraries = self.settings().startup_libraries();
        for (name, version) in libraries {
            self.load_model(&name, &[&version])?;
        }
        Ok(())
    }

    // --- class queries --------------------------------------------------

    pub fn get_class_names(
        &mut self,
        class_name: &str,
        recursive: bool,
        qualified: bool,
        sort: bool,
        builtin: bool,
        show_protected: bool,
    ) -> Result<Vec<String>, ProxyError> {
        let options = format!(
            "recursive={},qualified={},sort={},builtin={},showProtected={}",
            recursive, qualified, sort, builtin, show_protected
        );
        let expression = if class_name.is_empty() {
            format!("getClassNames({})", options)
        } else {
            format!("getClassNames({},{})", class_name, options)
        };
        self.send_command(&expression)?;
        Ok(split_list(strip_braces(self.result())))
    }

    pub fn search_class_names(
        &mut self,
        text: &str,
        find_in_text: bool,
    ) -> Result<Vec<String>, ProxyError> {
        self.send_command(&format!(
            "searchClassNames(\"{}\",findInText={})",
            escape_string(text),
            find_in_text
        ))?;
        Ok(split_list(strip_braces(self.result())))
    }

    pub fn get_class_comment(&mut self, class_name: &str) -> Result<String, ProxyError> {
        self.send_command(&format!("getClassComment({})", class_name))?;
        Ok(unquote(self.result()).to_string())
    }

    /// Structured class information (source file, extent, flags)
    pub fn get_class_information(&mut self, class_name: &str) -> Result<Value, ProxyError> {
        self.send_command(&format!("getClassInformation({})", class_name))?;
        Ok(parse_expression(self.result()))
    }

    pub fn get_class_restriction(&mut self, class_name: &str) -> Result<String, ProxyError> {
        self.send_command_with(
            &format!("getClassRestriction({})", class_name),
            true,
            class_name,
            false,
        )?;
        Ok(unquote(self.result()).to_string())
    }

    /// Restriction mapped back onto the kind table
    pub fn class_kind(&mut self, class_name: &str) -> Result<Option<ClassKind>, ProxyError> {
        let restriction = self.get_class_restriction(class_name)?;
        Ok(ClassKind::from_restriction(&restriction))
    }

    pub fn get_source_file(&mut self, class_name: &str) -> Result<String, ProxyError> {
        self.send_command(&format!("getSourceFile({})", class_name))?;
        Ok(unquote(self.result()).to_string())
    }

    pub fn set_source_file(&mut self, class_name: &str, path: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "setSourceFile({},\"{}\")",
            class_name,
            escape_string(path)
        ))?;
        Ok(self.reply_true())
    }

    /// Textual form of a class, cached per class
    pub fn list(&mut self, class_name: &str) -> Result<String, ProxyError> {
        self.send_command_with(&format!("list({})", class_name), true, class_name, false)?;
        Ok(unquote(self.result()).to_string())
    }

    pub fn get_documentation_annotation(
        &mut self,
        class_name: &str,
    ) -> Result<Vec<String>, ProxyError> {
        self.send_command(&format!("getDocumentationAnnotation({})", class_name))?;
        Ok(unquote_list(self.result()))
    }

    pub fn is_documentation_class(&mut self, class_name: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "getNamedAnnotation({},DocumentationClass)",
            class_name
        ))?;
        Ok(contains_ci(strip_braces(self.result()), "true"))
    }

    pub fn get_enumeration_literals(
        &mut self,
        class_name: &str,
    ) -> Result<Vec<String>, ProxyError> {
        self.send_command(&format!("getEnumerationLiterals({})", class_name))?;
        Ok(unquote_list(self.result()))
    }

    pub fn get_default_component_name(&mut self, class_name: &str) -> Result<String, ProxyError> {
        self.send_command(&format!("getDefaultComponentName({})", class_name))?;
        Ok(unquote(self.result()).to_string())
    }

    pub fn get_default_component_prefixes(
        &mut self,
        class_name: &str,
    ) -> Result<String, ProxyError> {
        self.send_command(&format!("getDefaultComponentPrefixes({})", class_name))?;
        Ok(unquote(self.result()).to_string())
    }

    // --- predicates -----------------------------------------------------

    /// `is<Kind>(class)`, cached per class
    pub fn is_kind(&mut self, kind: ClassKind, class_name: &str) -> Result<bool, ProxyError> {
        self.send_command_with(
            &format!("is{}({})", kind.command_name(), class_name),
            true,
            class_name,
            false,
        )?;
        Ok(self.reply_true())
    }

    pub fn is_package(&mut self, class_name: &str) -> Result<bool, ProxyError> {
        self.is_kind(ClassKind::Package, class_name)
    }

    pub fn is_partial(&mut self, class_name: &str) -> Result<bool, ProxyError> {
        self.send_command_with(
            &format!("isPartial({})", class_name),
            true,
            class_name,
            false,
        )?;
        Ok(self.reply_true())
    }

    pub fn is_protected(&mut self, parameter: &str, class_name: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!("isProtected({},{})", parameter, class_name))?;
        Ok(self.reply_true())
    }

    pub fn is_protected_class(&mut self, class_name: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!("isProtectedClass({})", class_name))?;
        Ok(self.reply_true())
    }

    pub fn is_experiment(&mut self, class_name: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!("isExperiment({})", class_name))?;
        Ok(self.reply_true())
    }

    pub fn is_builtin_type(&mut self, class_name: &str) -> Result<bool, ProxyError> {
        self.send_command_with(
            &format!("isBuiltinType({})", class_name),
            true,
            class_name,
            false,
        )?;
        Ok(self.reply_true())
    }

    pub fn get_builtin_type(&mut self, class_name: &str) -> Result<String, ProxyError> {
        self.send_command_with(
            &format!("getBuiltinType({})", class_name),
            true,
            class_name,
            false,
        )?;
        Ok(unquote(self.result()).to_string())
    }

    pub fn exist_class(&mut self, class_name: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!("existClass({})", class_name))?;
        Ok(self.reply_true())
    }

    // --- class mutation -------------------------------------------------

    pub fn create_class(&mut self, kind: ClassKind, class_name: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "{} {} end {};",
            kind.restriction_name(),
            class_name,
            class_name
        ))?;
        Ok(!self.reply_has_error())
    }

    pub fn create_sub_class(
        &mut self,
        kind: ClassKind,
        class_name: &str,
        parent_class_name: &str,
    ) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "within {}; {} {} end {};",
            parent_class_name,
            kind.restriction_name(),
            class_name,
            class_name
        ))?;
        Ok(!self.reply_has_error())
    }

    pub fn copy_class(
        &mut self,
        class_name: &str,
        new_name: &str,
        within: &str,
    ) -> Result<bool, ProxyError> {
        let expression = if within.is_empty() {
            format!("copyClass({},\"{}\")", class_name, new_name)
        } else {
            format!("copyClass({},\"{}\",{})", class_name, new_name, within)
        };
        self.send_command(&expression)?;
        Ok(self.reply_true())
    }

    /// Rename a class, invalidating its cached replies
    ///
    /// Legacy polarity: the reply flag reports failure, so a `true`
    /// answer means the rename did not happen.
    pub fn rename_class(&mut self, old_name: &str, new_name: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!("renameClass({},{})", old_name, new_name))?;
        let renamed = !self.reply_true();
        if renamed {
            self.invalidate_cached_class(old_name);
        }
        Ok(renamed)
    }

    pub fn delete_class(&mut self, class_name: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!("deleteClass({})", class_name))?;
        let deleted = self.reply_true();
        if deleted {
            self.invalidate_cached_class(class_name);
        }
        Ok(deleted)
    }

    pub fn save(&mut self, class_name: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!("save({})", class_name))?;
        Ok(!self.reply_has_error())
    }

    /// Push edited class text to the compiler as-is
    ///
    /// The argument is the full class definition, not a command; the
    /// compiler re-parses it in place.
    pub fn save_modified_model(&mut self, model_text: &str) -> Result<bool, ProxyError> {
        self.send_command(model_text)?;
        Ok(!self.reply_has_error())
    }

    pub fn save_total_scode(&mut self, path: &str, class_name: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "saveTotalSCode(\"{}\",{})",
            escape_string(path),
            class_name
        ))?;
        Ok(!self.reply_has_error())
    }

    pub fn add_class_annotation(
        &mut self,
        class_name: &str,
        annotation: &str,
    ) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "addClassAnnotation({},annotate={})",
            class_name, annotation
        ))?;
        let added = self.reply_true();
        if added {
            self.invalidate_cached_class(class_name);
        }
        Ok(added)
    }

    pub fn load_model(&mut self, name: &str, versions: &[&str]) -> Result<bool, ProxyError> {
        let versions = versions
            .iter()
            .map(|version| format!("\"{}\"", version))
            .collect::<Vec<_>>()
            .join(",");
        self.send_command(&format!("loadModel({},{{{}}})", name, versions))?;
        Ok(self.reply_true())
    }

    pub fn load_file(&mut self, path: &str, encoding: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "loadFile(\"{}\",\"{}\")",
            escape_string(path),
            encoding
        ))?;
        Ok(self.reply_true())
    }

    pub fn load_string(&mut self, text: &str, path: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "loadString(\"{}\",\"{}\")",
            escape_string(text),
            escape_string(path)
        ))?;
        Ok(self.reply_true())
    }

    /// Class names declared in a file, without loading it
    pub fn parse_file(&mut self, path: &str) -> Result<Vec<String>, ProxyError> {
        self.send_command(&format!("parseFile(\"{}\")", escape_string(path)))?;
        Ok(split_list(strip_braces(self.result())))
    }

    pub fn parse_string(&mut self, text: &str, path: &str) -> Result<Vec<String>, ProxyError> {
        self.send_command(&format!(
            "parseString(\"{}\",\"{}\")",
            escape_string(text),
            escape_string(path)
        ))?;
        Ok(split_list(strip_braces(self.result())))
    }

    // --- parameters -----------------------------------------------------

    pub fn get_parameter_names(&mut self, class_name: &str) -> Result<Vec<String>, ProxyError> {
        self.send_command(&format!("getParameterNames({})", class_name))?;
        Ok(split_list(strip_braces(self.result())))
    }

    pub fn get_parameter_value(
        &mut self,
        class_name: &str,
        parameter: &str,
    ) -> Result<String, ProxyError> {
        self.query(&format!("getParameterValue({},{})", class_name, parameter))
    }

    pub fn set_parameter_value(
        &mut self,
        class_name: &str,
        parameter: &str,
        value: &str,
    ) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "setParameterValue({},{},{})",
            class_name, parameter, value
        ))?;
        Ok(self.reply_ok())
    }

    // --- component modifiers ---------------------------------------------

    pub fn get_component_modifier_names(
        &mut self,
        class_name: &str,
        name: &str,
    ) -> Result<Vec<String>, ProxyError> {
        self.send_command(&format!(
            "getComponentModifierNames({},\"{}\")",
            class_name, name
        ))?;
        Ok(unquote_list(self.result()))
    }

    pub fn get_component_modifier_value(
        &mut self,
        class_name: &str,
        name: &str,
    ) -> Result<String, ProxyError> {
        self.send_command(&format!(
            "getComponentModifierValue({},{})",
            class_name, name
        ))?;
        Ok(modifier_value(self.result()).to_string())
    }

    /// An empty value clears the modifier
    pub fn set_component_modifier_value(
        &mut self,
        class_name: &str,
        name: &str,
        value: &str,
    ) -> Result<bool, ProxyError> {
        let expression = if value.is_empty() {
            format!("setComponentModifierValue({},{},$Code(()))", class_name, name)
        } else {
            format!(
                "setComponentModifierValue({},{},$Code(={}))",
                class_name, name, value
            )
        };
        self.send_command(&expression)?;
        Ok(self.reply_ok())
    }

    // --- extends modifiers -----------------------------------------------

    pub fn get_extends_modifier_names(
        &mut self,
        class_name: &str,
        extends_class: &str,
    ) -> Result<Vec<String>, ProxyError> {
        self.send_command(&format!(
            "getExtendsModifierNames({},{})",
            class_name, extends_class
        ))?;
        Ok(unquote_list(self.result()))
    }

    pub fn get_extends_modifier_value(
        &mut self,
        class_name: &str,
        extends_class: &str,
        modifier: &str,
    ) -> Result<String, ProxyError> {
        self.send_command(&format!(
            "getExtendsModifierValue({},{},{})",
            class_name, extends_class, modifier
        ))?;
        Ok(modifier_value(self.result()).to_string())
    }

    pub fn set_extends_modifier_value(
        &mut self,
        class_name: &str,
        extends_class: &str,
        modifier: &str,
        value: &str,
    ) -> Result<bool, ProxyError> {
        let expression = if value.is_empty() {
            format!(
                "setExtendsModifierValue({},{},{},$Code(()))",
                class_name, extends_class, modifier
            )
        } else {
            format!(
                "setExtendsModifierValue({},{},{},$Code(={}))",
                class_name, extends_class, modifier, value
            )
        };
        self.send_command(&expression)?;
        Ok(self.reply_ok())
    }

    pub fn is_extends_modifier_final(
        &mut self,
        class_name: &str,
        extends_class: &str,
        modifier: &str,
    ) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "isExtendsModifierFinal({},{},{})",
            class_name, extends_class, modifier
        ))?;
        Ok(self.reply_true())
    }

    pub fn get_derived_class_modifier_value(
        &mut self,
        class_name: &str,
        modifier: &str,
    ) -> Result<String, ProxyError> {
        self.send_command(&format!(
            "getDerivedClassModifierValue({},{})",
            class_name, modifier
        ))?;
        Ok(unquote(modifier_value(self.result())).to_string())
    }

    // --- components -----------------------------------------------------

    pub fn get_components(&mut self, class_name: &str) -> Result<Vec<Component>, ProxyError> {
        self.send_command(&format!("getComponents({})", class_name))?;
        Ok(split_arrays(self.result())
            .iter()
            .filter_map(|chunk| Component::parse(chunk))
            .collect())
    }

    pub fn get_component_annotations(
        &mut self,
        class_name: &str,
    ) -> Result<Vec<String>, ProxyError> {
        self.send_command(&format!("getComponentAnnotations({})", class_name))?;
        Ok(split_arrays(self.result()))
    }

    pub fn add_component(
        &mut self,
        name: &str,
        class_name: &str,
        to_class: &str,
        annotation: &str,
    ) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "addComponent({},{},{},annotate={})",
            name, class_name, to_class, annotation
        ))?;
        Ok(self.reply_true())
    }

    pub fn delete_component(&mut self, name: &str, class_name: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!("deleteComponent({},{})", name, class_name))?;
        Ok(self.reply_true())
    }

    pub fn update_component(
        &mut self,
        name: &str,
        class_name: &str,
        to_class: &str,
        annotation: &str,
    ) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "updateComponent({},{},{},annotate={})",
            name, class_name, to_class, annotation
        ))?;
        Ok(self.reply_true())
    }

    pub fn set_component_comment(
        &mut self,
        class_name: &str,
        component_name: &str,
        comment: &str,
    ) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "setComponentComment({},{},\"{}\")",
            class_name,
            component_name,
            escape_string(comment)
        ))?;
        Ok(!self.reply_has_error())
    }

    /// Update the declaration prefixes of one component
    #[allow(clippy::too_many_arguments)]
    pub fn set_component_properties(
        &mut self,
        class_name: &str,
        component_name: &str,
        is_final: bool,
        is_flow: bool,
        is_protected: bool,
        is_replaceable: bool,
        variability: &str,
        is_inner: bool,
        is_outer: bool,
        causality: &str,
    ) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "setComponentProperties({},{},{{{},{},{},{}}}, {{\"{}\"}}, {{{},{}}}, {{\"{}\"}})",
            class_name,
            component_name,
            is_final,
            is_flow,
            is_protected,
            is_replaceable,
            variability,
            is_inner,
            is_outer,
            causality
        ))?;
        Ok(!self.reply_has_error())
    }

    pub fn rename_component(
        &mut self,
        class_name: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "renameComponent({},{},{})",
            class_name, old_name, new_name
        ))?;
        let renamed = !self.reply_has_error();
        if renamed {
            self.invalidate_cached_class(class_name);
        }
        Ok(renamed)
    }

    pub fn rename_component_in_class(
        &mut self,
        class_name: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "renameComponentInClass({},{},{})",
            class_name, old_name, new_name
        ))?;
        let renamed = !self.reply_has_error();
        if renamed {
            self.invalidate_cached_class(class_name);
        }
        Ok(renamed)
    }

    // --- connections -----------------------------------------------------

    pub fn get_connection_count(&mut self, class_name: &str) -> Result<usize, ProxyError> {
        self.send_command(&format!("getConnectionCount({})", class_name))?;
        Ok(self.result().parse().unwrap_or(0))
    }

    pub fn get_nth_connection(
        &mut self,
        class_name: &str,
        index: usize,
    ) -> Result<Vec<String>, ProxyError> {
        self.send_command(&format!("getNthConnection({},{})", class_name, index))?;
        Ok(split_list(strip_braces(self.result())))
    }

    pub fn get_nth_connection_annotation(
        &mut self,
        class_name: &str,
        index: usize,
    ) -> Result<String, ProxyError> {
        self.query(&format!(
            "getNthConnectionAnnotation({},{})",
            class_name, index
        ))
    }

    pub fn add_connection(
        &mut self,
        from: &str,
        to: &str,
        class_name: &str,
    ) -> Result<bool, ProxyError> {
        self.send_command(&format!("addConnection({},{},{})", from, to, class_name))?;
        Ok(self.reply_ok())
    }

    pub fn delete_connection(
        &mut self,
        from: &str,
        to: &str,
        class_name: &str,
    ) -> Result<bool, ProxyError> {
        self.send_command(&format!("deleteConnection({},{},{})", from, to, class_name))?;
        Ok(self.reply_ok())
    }

    pub fn update_connection(
        &mut self,
        from: &str,
        to: &str,
        class_name: &str,
        annotation: &str,
    ) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "updateConnection({},{},{},annotate={})",
            from, to, class_name, annotation
        ))?;
        Ok(self.reply_ok())
    }

    // --- inheritance -----------------------------------------------------

    pub fn get_inheritance_count(&mut self, class_name: &str) -> Result<usize, ProxyError> {
        self.send_command(&format!("getInheritanceCount({})", class_name))?;
        Ok(self.result().parse().unwrap_or(0))
    }

    pub fn get_nth_inherited_class(
        &mut self,
        class_name: &str,
        index: usize,
    ) -> Result<String, ProxyError> {
        self.query(&format!("getNthInheritedClass({},{})", class_name, index))
    }

    // --- simulation and build --------------------------------------------

    /// Raw simulate reply, `parameters` in `name=value,...` form
    pub fn simulate(&mut self, class_name: &str, parameters: &str) -> Result<String, ProxyError> {
        let expression = if parameters.is_empty() {
            format!("simulate({})", class_name)
        } else {
            format!("simulate({},{})", class_name, parameters)
        };
        self.query(&expression)
    }

    pub fn build_model(&mut self, class_name: &str, parameters: &str) -> Result<bool, ProxyError> {
        let expression = if parameters.is_empty() {
            format!("buildModel({})", class_name)
        } else {
            format!("buildModel({},{})", class_name, parameters)
        };
        self.send_command(&expression)?;
        Ok(!self.reply_has_error())
    }

    pub fn translate_model(
        &mut self,
        class_name: &str,
        parameters: &str,
    ) -> Result<bool, ProxyError> {
        let expression = if parameters.is_empty() {
            format!("translateModel({})", class_name)
        } else {
            format!("translateModel({},{})", class_name, parameters)
        };
        self.send_command(&expression)?;
        Ok(self.reply_true())
    }

    pub fn check_model(&mut self, class_name: &str) -> Result<String, ProxyError> {
        self.send_command(&format!("checkModel({})", class_name))?;
        Ok(unquote(self.result()).to_string())
    }

    pub fn check_all_models_recursive(
        &mut self,
        class_name: &str,
    ) -> Result<String, ProxyError> {
        self.send_command(&format!("checkAllModelsRecursive({})", class_name))?;
        Ok(unquote(self.result()).to_string())
    }

    pub fn instantiate_model(&mut self, class_name: &str) -> Result<String, ProxyError> {
        self.send_command(&format!("instantiateModel({})", class_name))?;
        Ok(unquote(self.result()).to_string())
    }

    /// Experiment annotation values `(startTime,stopTime,tolerance,...)`
    pub fn get_simulation_options(
        &mut self,
        class_name: &str,
    ) -> Result<Vec<String>, ProxyError> {
        self.send_command(&format!("getSimulationOptions({})", class_name))?;
        Ok(split_list(strip_parens(self.result())))
    }

    pub fn read_simulation_result_vars(
        &mut self,
        file_name: &str,
    ) -> Result<Vec<String>, ProxyError> {
        self.send_command(&format!(
            "readSimulationResultVars(\"{}\")",
            escape_string(file_name)
        ))?;
        let mut variables = unquote_list(self.result());
        variables.sort();
        Ok(variables)
    }

    pub fn close_simulation_result_file(&mut self) -> Result<bool, ProxyError> {
        self.send_command("closeSimulationResultFile()")?;
        Ok(self.reply_true())
    }

    pub fn translate_model_fmu(&mut self, class_name: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!("translateModelFMU({})", class_name))?;
        Ok(!self.result().is_empty() && !self.reply_has_error())
    }

    pub fn translate_model_xml(&mut self, class_name: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!("translateModelXML({})", class_name))?;
        Ok(!self.result().is_empty() && !self.reply_has_error())
    }

    /// Returns the path of the generated model file
    pub fn import_fmu(&mut self, file_name: &str, output_dir: &str) -> Result<String, ProxyError> {
        self.send_command(&format!(
            "importFMU(\"{}\",\"{}\")",
            escape_string(file_name),
            escape_string(output_dir)
        ))?;
        Ok(unquote(self.result()).to_string())
    }

    // --- compiler configuration -------------------------------------------

    pub fn get_matching_algorithm(&mut self) -> Result<String, ProxyError> {
        self.send_command("getMatchingAlgorithm()")?;
        Ok(unquote(self.result()).to_string())
    }

    /// `(names, descriptions)` of the selectable matching algorithms
    pub fn get_available_matching_algorithms(
        &mut self,
    ) -> Result<(Vec<String>, Vec<String>), ProxyError> {
        self.send_command("getAvailableMatchingAlgorithms()")?;
        Ok(parse_choices(self.result()))
    }

    pub fn set_matching_algorithm(&mut self, name: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!("setMatchingAlgorithm(\"{}\")", name))?;
        Ok(self.reply_true())
    }

    pub fn get_index_reduction_method(&mut self) -> Result<String, ProxyError> {
        self.send_command("getIndexReductionMethod()")?;
        Ok(unquote(self.result()).to_string())
    }

    pub fn get_available_index_reduction_methods(
        &mut self,
    ) -> Result<(Vec<String>, Vec<String>), ProxyError> {
        self.send_command("getAvailableIndexReductionMethods()")?;
        Ok(parse_choices(self.result()))
    }

    pub fn set_index_reduction_method(&mut self, name: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!("setIndexReductionMethod(\"{}\")", name))?;
        Ok(self.reply_true())
    }

    pub fn set_command_line_options(&mut self, options: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "setCommandLineOptions(\"{}\")",
            escape_string(options)
        ))?;
        Ok(self.reply_true())
    }

    pub fn clear_command_line_options(&mut self) -> Result<bool, ProxyError> {
        self.send_command("clearCommandLineOptions()")?;
        Ok(self.reply_true())
    }

    pub fn set_debug_flags(&mut self, flags: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!("setDebugFlags(\"{}\")", escape_string(flags)))?;
        Ok(self.reply_true())
    }

    pub fn get_config_flag_valid_options(
        &mut self,
        flag: &str,
    ) -> Result<(Vec<String>, Vec<String>), ProxyError> {
        self.send_command(&format!("getConfigFlagValidOptions(\"{}\")", flag))?;
        Ok(parse_choices(self.result()))
    }

    pub fn num_processors(&mut self) -> Result<usize, ProxyError> {
        self.send_command("numProcessors()")?;
        Ok(self.result().parse().unwrap_or(1))
    }

    pub fn help(&mut self, topic: &str) -> Result<String, ProxyError> {
        let expression = if topic.is_empty() {
            "help()".to_string()
        } else {
            format!("help(\"{}\")", topic)
        };
        self.send_command(&expression)?;
        Ok(unquote(self.result()).to_string())
    }

    pub fn uri_to_filename(&mut self, uri: &str) -> Result<String, ProxyError> {
        self.send_command(&format!("uriToFilename(\"{}\")", escape_string(uri)))?;
        let first_line = self.result().lines().next().unwrap_or("");
        Ok(unquote(first_line).to_string())
    }

    pub fn modelica_path(&mut self) -> Result<String, ProxyError> {
        self.send_command("getModelicaPath()")?;
        Ok(unquote(self.result()).to_string())
    }

    pub fn available_libraries(&mut self) -> Result<Vec<String>, ProxyError> {
        self.send_command("getAvailableLibraries()")?;
        let mut libraries = unquote_list(self.result());
        libraries.sort();
        Ok(libraries)
    }

    /// Change the working directory; empty argument queries it
    pub fn change_directory(&mut self, directory: &str) -> Result<String, ProxyError> {
        let expression = if directory.is_empty() {
            "cd()".to_string()
        } else {
            format!("cd(\"{}\")", escape_string(directory))
        };
        self.send_command(&expression)?;
        Ok(unquote(self.result()).to_string())
    }

    pub fn ngspice_to_modelica(&mut self, file_name: &str) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "ngspicetoModelica(\"{}\")",
            escape_string(file_name)
        ))?;
        Ok(self.reply_true())
    }

    pub fn export_to_figaro(
        &mut self,
        class_name: &str,
        directory: &str,
        mode: &str,
        options: &str,
        processor: &str,
    ) -> Result<bool, ProxyError> {
        self.send_command(&format!(
            "exportToFigaro({},\"{}\",\"{}\",\"{}\",\"{}\")",
            class_name,
            escape_string(directory),
            mode,
            escape_string(options),
            escape_string(processor)
        ))?;
        Ok(self.reply_true())
    }
}

/// Decode a `({"name",...},{"description",...})` choices reply
///
/// The paren-stripped text is two braced chunks separated by a
/// top-level comma; each chunk unquotes on its own.
fn parse_choices(reply: &str) -> (Vec<String>, Vec<String>) {
    let chunks = split_list(strip_parens(reply));
    let names = chunks.first().map(|c| unquote_list(c)).unwrap_or_default();
    let descriptions = chunks.get(1).map(|c| unquote_list(c)).unwrap_or_default();
    (names, descriptions)
}
