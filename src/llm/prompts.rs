// Prompt templates for the idea, function and test stages

use crate::schema::{FunctionDescriptor, Idea, PackageMeta};

pub const IDEA_PROMPT_MARKER: &str = "Respond with a JSON array of objects";
pub const FUNCTION_PROMPT_MARKER: &str = "Write a Node.js function called";
pub const TEST_PROMPT_MARKER: &str = "Write a test for the function called";

/// Name every generated test module exports its entry point under.
pub const TEST_ENTRY_POINT: &str = "runTests";

const FORMAT_RULES: &str = r#"
Only respond with the javascript code, and nothing else.
You may add comments to explain the code, but only do so in compliance with js-doc and javascript commenting.
Assume you're writing directly into the .js file, so don't include the triple backticks for markdown, just write raw JS.
You are pipelining this response into a valid .js file, respond like:
/**
 * Converts a list of strings into a single sentence with a custom separator.
 *
 * @param {string[]} stringList - The list of strings to convert.
 * @param {string} separator - The custom separator to use for joining strings.
 * @return {string} A single sentence made by joining the list of strings with the custom separator.
 */
function joinStringsWithCustomSeparator(stringList, separator) {
    return stringList.join(separator);
}
"#;

const LINTING_RULES: &str = r#"
Rules:
1. Strings must use doublequotes.
2. Follow eslint best-practices for the code format.
3. Add a new line before the js-doc, after the function, and after the module export declaration.
4. In the JS-doc, include a commented example of how to use the function.
5. Use "const" wherever variables aren't re-assigned.
6. Use parentheses around arrow function arguments.
7. Split 'let' declarations into multiple statements.
8. Blocks must not be padded by blank lines.
9. Write valid JS-doc for each function with a @param tag (type and description) per parameter, in order, and a @return tag with type and description.
10. Trailing spaces not allowed.
11. Don't import or require any packages, write everything in pure Javascript.
12. All functions must be written in camelCase format.
"#;

pub fn package_idea_prompt(idea: &Idea) -> String {
    format!(
        r#"Create {count_word} useful npm package I could build for the {theme} community that doesn't exist yet.

{marker} with 'name' of the package, 'description' of what it does, and 'functions' which is a list of exactly {n} example functions in the package, each formatted as an object with 'function_name' and 'function_summary'.

The package name must be lowercase, use only letters, digits and hyphens, and start with "{prefix}-".
Function names must be camelCase identifiers.

Only return ideas for packages that don't need external packages, models or APIs to work, and would be feasible with pure Javascript.

If some of the example functions need to iterate through complex data, which isn't a basic string or array, generate an example of the data in 'example_data' within the object defining the function.

Respond with raw JSON only, no markdown."#,
        count_word = "1",
        theme = idea.prompt,
        marker = IDEA_PROMPT_MARKER,
        n = idea.number_of_functions,
        prefix = idea.name_prefix,
    )
}

pub fn function_prompt(descriptor: &FunctionDescriptor, meta: &PackageMeta) -> String {
    let example = descriptor
        .example_data
        .as_ref()
        .map(|data| {
            format!(
                "\nThe function operates on data shaped like this example:\n{}\n",
                data
            )
        })
        .unwrap_or_default();

    format!(
        r#"{marker} "{name}" for the npm package "{package}" ({description}) that performs the following task: {summary}.
{example}
Handle every edge case the task implies: wrong argument types, empty inputs, boundary values and invalid values must be checked explicitly.
Do not call or invoke the function anywhere in the file.
Do not use "while" loops.
{format_rules}
{linting_rules}
After you write the function, export it exactly like this, using the function name:

module.exports = {{ {name} }};
"#,
        marker = FUNCTION_PROMPT_MARKER,
        name = descriptor.function_name,
        package = meta.name,
        description = meta.description,
        summary = descriptor.function_summary,
        example = example,
        format_rules = FORMAT_RULES,
        linting_rules = LINTING_RULES,
    )
}

pub fn test_prompt(descriptor: &FunctionDescriptor, function_code: &str) -> String {
    format!(
        r#"{marker} "{name}" using only pure Javascript and no external packages:

{code}

The function "{name}" is already in scope; do not require or import it again.

Wrap the whole test in a single function named "{entry}" that takes no arguments. Inside it:
- declare `const name_of_function = "{name}";`
- declare `let number_of_tests_passed = 0;` and `let number_of_tests_failed = 0;`
- put every assertion in its own try/catch so one failing case never stops the others, incrementing the matching counter
- finish with exactly this line:
  addToReadme(generateTestBadge(name_of_function, number_of_tests_passed, number_of_tests_failed));

The helpers addToReadme and generateTestBadge already exist; do not define them.
Do not call "{entry}" yourself and do not export anything.
Test the edge cases described by: {summary}
{format_rules}
{linting_rules}"#,
        marker = TEST_PROMPT_MARKER,
        name = descriptor.function_name,
        code = function_code,
        entry = TEST_ENTRY_POINT,
        summary = descriptor.function_summary,
        format_rules = FORMAT_RULES,
        linting_rules = LINTING_RULES,
    )
}
