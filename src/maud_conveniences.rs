use maud::{Markup, Render, html};

pub fn render_nav() -> Markup {
    const LINK: &str = "text-gray-300 hover:text-white hover:bg-gray-700 px-3 py-2 rounded";

    html! {
        nav class="w-full bg-gray-800 shadow-md mb-4" {
            div class="container mx-auto flex flex-row items-center justify-between p-4" {
                div class="flex flex-row space-x-2" {
                    a href="/" class=(LINK) {"Students"}
                    a href="/student/add" class=(LINK) {"Add Student"}
                    a href="/scan" class=(LINK) {"Scan QR"}
                    a href="/import" class=(LINK) {"Import CSV"}
                }
                form method="get" action="/student/email" class="flex flex-row space-x-2" {
                    input type="email" name="email" placeholder="Find by email" required class="shadow appearance-none border rounded py-1 px-2 leading-tight focus:outline-none bg-gray-700 border-gray-600";
                    (form_submit_button(Some("Find")))
                }
            }
        }
    }
}

pub fn render_table<const N: usize>(
    overall_title: &'static str,
    titles: [&'static str; N],
    items: Vec<[Markup; N]>,
) -> Markup {
    html! {
        div class="container mx-auto" {
            (title(overall_title))
            div class="overflow-x-auto" {
                table class="min-w-full bg-gray-800 rounded shadow-md" {
                    thead class="bg-gray-700" {
                        tr {
                            @for title in titles {
                                th class="py-2 px-4 text-left font-semibold text-gray-300" {(title)}
                            }
                        }
                    }
                    tbody {
                        @for row in items {
                            tr {
                                @for col in row {
                                    td class="py-2 px-4 border-b border-gray-600 text-gray-200" {(col)}
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

pub fn title(s: impl Render) -> Markup {
    html! {
        h1 class="text-2xl font-semibold mb-4" {(s)}
    }
}

pub fn subtitle(s: impl Render) -> Markup {
    html! {
        h2 class="text-xl font-semibold mb-2" {(s)}
    }
}

pub fn form_element(id: &'static str, label: &'static str, input: Markup) -> Markup {
    html! {
        div class="mb-4" {
            label for=(id) class="block text-sm font-bold mb-2 text-gray-300" {(label)}
            (input)
        }
    }
}

pub fn simple_form_element(
    id: &'static str,
    label: &'static str,
    required: bool,
    ty: Option<&'static str>,
    value: Option<&str>,
) -> Markup {
    form_element(
        id,
        label,
        html! {
            input required[required] type=(ty.unwrap_or("text")) id=(id) name=(id) value=[value] class="shadow appearance-none border rounded w-full py-2 px-3 leading-tight focus:outline-none focus:shadow-outline bg-gray-700 border-gray-600";
        },
    )
}

pub fn file_form_element(id: &'static str, label: &'static str, accept: &'static str) -> Markup {
    form_element(
        id,
        label,
        html! {
            input type="file" id=(id) name=(id) accept=(accept) class="block w-full text-sm text-gray-300 file:mr-4 file:py-2 file:px-4 file:rounded file:border-0 file:text-sm file:font-semibold file:bg-violet-50 file:text-violet-700 hover:file:bg-violet-100";
        },
    )
}

pub fn form_submit_button(text: Option<&'static str>) -> Markup {
    html! {
        button type="submit" class="bg-blue-500 hover:bg-blue-700 font-bold py-2 px-4 rounded focus:outline-none focus:shadow-outline" {
            (text.unwrap_or("Submit"))
        }
    }
}

pub fn errors_list(heading: Option<&'static str>, errors: impl Iterator<Item = impl Render>) -> Markup {
    html! {
        div class="bg-red-100 border border-red-400 text-red-700 px-4 py-3 rounded relative mb-4" role="alert" {
            @if let Some(heading) = heading {
                strong class="font-bold" {(heading)}
            }
            ul class="list-disc list-inside" {
                @for error in errors {
                    li {(error)}
                }
            }
        }
    }
}
